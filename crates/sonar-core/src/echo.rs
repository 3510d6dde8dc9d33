//! Echo pulse capture and the result it hands to the supervisor.
//!
//! [`EchoCapture`] runs in interrupt context: it sees both edges of the echo line and
//! owns the one-shot timeout alarm. [`EchoChannel`] is the only state it shares with the
//! foreground, and the only writer of a terminal result is the capture.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};

use crate::distance::Distance;
use crate::error::MeasurementError;

/// Outcome of the current measurement cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EchoResult {
    /// No measurement requested
    #[default]
    Idle,
    /// Trigger fired, echo not complete yet
    Pending,
    /// Full echo pulse observed
    Ready { rise: Instant, fall: Instant },
    /// Rising edge seen, falling edge never came
    TimedOut,
}

impl EchoResult {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EchoResult::Ready { .. } | EchoResult::TimedOut)
    }

    /// Turn the result into a distance. Anything short of a full pulse counts as a failure.
    pub fn distance(&self) -> Result<Distance, MeasurementError> {
        match *self {
            EchoResult::Ready { rise, fall } => Distance::from_echo(rise, fall),
            EchoResult::TimedOut => Err(MeasurementError::EchoTimeout),
            EchoResult::Idle | EchoResult::Pending => Err(MeasurementError::NoEcho),
        }
    }
}

/// Echo result shared between the capture (interrupt context) and the supervisor.
pub struct EchoChannel {
    result: Mutex<CriticalSectionRawMutex, Cell<EchoResult>>,
    settled: Signal<CriticalSectionRawMutex, ()>,
    rearmed: Signal<CriticalSectionRawMutex, ()>,
}

impl EchoChannel {
    pub const fn new() -> Self {
        Self {
            result: Mutex::new(Cell::new(EchoResult::Idle)),
            settled: Signal::new(),
            rearmed: Signal::new(),
        }
    }

    /// Start a new cycle: the result becomes `Pending` and the capture drops any armed alarm.
    pub fn rearm(&self) {
        self.settled.reset();
        self.result.lock(|r| r.set(EchoResult::Pending));
        self.rearmed.signal(());
    }

    pub(crate) fn publish(&self, result: EchoResult) {
        self.result.lock(|r| r.set(result));
        if result.is_terminal() {
            self.settled.signal(());
        }
    }

    pub fn peek(&self) -> EchoResult {
        self.result.lock(|r| r.get())
    }

    /// Consume the result, leaving `Idle` behind.
    pub fn take(&self) -> EchoResult {
        self.result.lock(|r| r.replace(EchoResult::Idle))
    }

    /// Resolves once the current cycle reached `Ready` or `TimedOut`.
    pub async fn settled(&self) {
        self.settled.wait().await
    }

    /// Resolves on the next [`rearm`](Self::rearm).
    pub async fn rearmed(&self) {
        self.rearmed.wait().await
    }
}

impl Default for EchoChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    /// Edges are ignored until the next rearm
    Idle,
    /// Waiting for the rising edge
    Listening,
    /// Rising edge seen; the alarm fires at `deadline`
    Measuring { rise: Instant, deadline: Instant },
}

/// Edge-driven state machine behind the echo interrupt.
///
/// The driving task feeds it edges, alarm expiries and rearm notifications. The alarm is
/// the `deadline` of the `Measuring` phase, so at most one is ever armed.
///
/// The last seen line level is kept so that a task which was busy when an edge happened can
/// still catch up from the pin level with [`on_level`](Self::on_level).
pub struct EchoCapture<'a> {
    channel: &'a EchoChannel,
    timeout: Duration,
    phase: Phase,
    high: bool,
}

impl<'a> EchoCapture<'a> {
    pub fn new(channel: &'a EchoChannel, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            phase: Phase::Idle,
            high: false,
        }
    }

    /// A new measurement begins: cancel the alarm and wait for a rising edge.
    pub fn rearm(&mut self) {
        self.phase = Phase::Listening;
    }

    pub fn on_edge(&mut self, edge: Edge, now: Instant) {
        self.high = edge == Edge::Rising;
        match edge {
            Edge::Rising => self.on_rising(now),
            Edge::Falling => self.on_falling(now),
        }
    }

    /// Feed the sampled line level. A level equal to the last one seen is not an edge.
    pub fn on_level(&mut self, high: bool, now: Instant) {
        if high != self.high {
            let edge = if high { Edge::Rising } else { Edge::Falling };
            self.on_edge(edge, now);
        }
    }

    fn on_rising(&mut self, now: Instant) {
        match self.phase {
            Phase::Idle => {}
            Phase::Listening | Phase::Measuring { .. } => {
                // A second rising edge restarts both the pulse and the timeout.
                self.phase = Phase::Measuring {
                    rise: now,
                    deadline: now + self.timeout,
                };
                self.channel.publish(EchoResult::Pending);
            }
        }
    }

    fn on_falling(&mut self, now: Instant) {
        match self.phase {
            Phase::Measuring { rise, .. } => {
                self.phase = Phase::Idle;
                self.channel.publish(EchoResult::Ready { rise, fall: now });
            }
            // Spurious: no pulse in progress.
            Phase::Idle | Phase::Listening => {}
        }
    }

    /// The alarm expired. No-op unless a pulse is still in progress.
    pub fn on_alarm(&mut self) {
        if let Phase::Measuring { rise, .. } = self.phase {
            debug!("echo timed out, rise at {}", rise);
            self.phase = Phase::Idle;
            self.channel.publish(EchoResult::TimedOut);
        }
    }

    /// Deadline of the armed alarm, if any.
    pub fn alarm(&self) -> Option<Instant> {
        match self.phase {
            Phase::Measuring { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}
