//! End-to-end console scenarios: the real supervisor loop, run on the embassy-time mock
//! driver, with a simulated HC-SR04 answering the trigger pin and feeding the echo capture.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::{Future, poll_fn};
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use embassy_time::{Duration, Instant, MockDriver};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use sonar_core::{
    Console, EchoCapture, EchoChannel, EchoResult, Edge, Supervisor, TimingConfig,
    TriggerDriver, WallClock,
};

/// The mock driver is process-wide; scenarios take turns on it.
static DRIVER: Mutex<()> = Mutex::new(());

fn fresh_driver() -> MutexGuard<'static, ()> {
    let guard = DRIVER.lock().unwrap_or_else(PoisonError::into_inner);
    MockDriver::get().reset();
    guard
}

/// Simulated time that passes each time the loop is blocked
const TICK: Duration = Duration::from_micros(50);

/// Sensor-to-echo latency after the trigger
const ECHO_LATENCY: Duration = Duration::from_micros(450);

/// How the simulated sensor answers a trigger
#[derive(Clone, Copy)]
enum Sensor {
    /// Echo pulse of this many microseconds
    Echo(u64),
    /// Rising edge, then the line stays high
    Stuck,
    /// No echo at all
    Silent,
}

/// Everything outside the supervisor: sensor, echo interrupt and serial line.
struct Rig<'a> {
    channel: &'a EchoChannel,
    capture: RefCell<EchoCapture<'a>>,
    edges: RefCell<VecDeque<(Instant, Edge)>>,
    sensor: Cell<Sensor>,
    fired: RefCell<Vec<Instant>>,
    input: RefCell<VecDeque<u8>>,
    output: RefCell<Vec<u8>>,
}

impl<'a> Rig<'a> {
    fn new(channel: &'a EchoChannel, config: &TimingConfig) -> Self {
        Self {
            channel,
            capture: RefCell::new(EchoCapture::new(channel, config.echo_timeout)),
            edges: RefCell::new(VecDeque::new()),
            sensor: Cell::new(Sensor::Echo(5_820)),
            fired: RefCell::new(Vec::new()),
            input: RefCell::new(VecDeque::new()),
            output: RefCell::new(Vec::new()),
        }
    }

    /// End of a trigger pulse: the capture rearms and the sensor schedules its answer.
    fn triggered(&self, now: Instant) {
        self.fired.borrow_mut().push(now);
        self.capture.borrow_mut().rearm();

        let mut edges = self.edges.borrow_mut();
        edges.clear();
        let rise = now + ECHO_LATENCY;
        match self.sensor.get() {
            Sensor::Echo(width) => {
                edges.push_back((rise, Edge::Rising));
                edges.push_back((rise + Duration::from_micros(width), Edge::Falling));
            }
            Sensor::Stuck => edges.push_back((rise, Edge::Rising)),
            Sensor::Silent => {}
        }
    }

    /// Play the echo interrupt up to `now`: due edges in order, and the alarm once expired.
    fn deliver(&self, now: Instant) {
        let mut capture = self.capture.borrow_mut();
        let mut edges = self.edges.borrow_mut();
        while let Some(&(at, edge)) = edges.front() {
            if at > now {
                break;
            }
            if capture.alarm().is_some_and(|deadline| deadline <= at) {
                capture.on_alarm();
            }
            capture.on_edge(edge, at);
            edges.pop_front();
        }
        if capture.alarm().is_some_and(|deadline| deadline <= now) {
            capture.on_alarm();
        }
    }

    fn pulses(&self) -> usize {
        self.fired.borrow().len()
    }

    fn take_output(&self) -> String {
        let bytes = std::mem::take(&mut *self.output.borrow_mut());
        String::from_utf8(bytes).unwrap()
    }
}

struct TriggerPin<'r, 'a> {
    rig: &'r Rig<'a>,
    high: bool,
}

impl ErrorType for TriggerPin<'_, '_> {
    type Error = Infallible;
}

impl OutputPin for TriggerPin<'_, '_> {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.high {
            self.rig.triggered(Instant::now());
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Console receive side: hands out queued bytes, blocks while the queue is empty.
struct Source<'r>(&'r RefCell<VecDeque<u8>>);

impl embedded_io::ErrorType for Source<'_> {
    type Error = Infallible;
}

impl embedded_io_async::Read for Source<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        poll_fn(|_| match self.0.borrow_mut().pop_front() {
            Some(byte) => {
                buf[0] = byte;
                Poll::Ready(Ok(1))
            }
            None => Poll::Pending,
        })
        .await
    }
}

struct Sink<'r>(&'r RefCell<Vec<u8>>);

impl embedded_io::ErrorType for Sink<'_> {
    type Error = Infallible;
}

impl embedded_io_async::Write for Sink<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Poll `fut` to completion, letting simulated time pass whenever it is blocked.
fn drive<F: Future>(rig: &Rig<'_>, fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    loop {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
        MockDriver::get().advance(TICK);
        rig.deliver(Instant::now());
    }
}

fn at(span: Duration) -> Instant {
    Instant::from_ticks(0) + span
}

struct Bench<'r, 'a> {
    rig: &'r Rig<'a>,
    supervisor: Supervisor,
    rx: Source<'r>,
    console: Console<Sink<'r>>,
    trigger: TriggerDriver<TriggerPin<'r, 'a>, NoDelay>,
}

impl<'r, 'a> Bench<'r, 'a> {
    fn new(rig: &'r Rig<'a>, config: TimingConfig) -> Self {
        let pin = TriggerPin { rig, high: false };
        Self {
            rig,
            supervisor: Supervisor::new(config, WallClock::default(), Instant::now()),
            rx: Source(&rig.input),
            console: Console::new(Sink(&rig.output)),
            trigger: TriggerDriver::new(pin, NoDelay, config.trigger_pulse).unwrap(),
        }
    }

    fn step(&mut self) {
        let step = self.supervisor.step(
            &mut self.rx,
            &mut self.console,
            &mut self.trigger,
            self.rig.channel,
        );
        drive(self.rig, step);
    }

    fn send(&self, text: &str) {
        self.rig.input.borrow_mut().extend(text.bytes());
    }

    /// Send `text` and step until the loop has consumed all of it.
    fn type_line(&mut self, text: &str) {
        self.send(text);
        while !self.rig.input.borrow().is_empty() {
            self.step();
        }
    }

    fn run_until(&mut self, span: Duration) {
        while Instant::now() < at(span) {
            self.step();
        }
    }
}

const STARTED: &str = "Sistema iniciado. Medindo distancia.\r\n";
const PAUSED: &str = "Sistema pausado.\r\n";
const UNKNOWN_HELLO: &str =
    "Comando desconhecido: hello\r\nComandos disponíveis: 'start', 'stop'\r\n";

#[test]
fn s1_start_reports_every_second() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    assert_eq!(rig.take_output(), STARTED);

    bench.run_until(Duration::from_millis(3_500));
    assert_eq!(
        rig.take_output(),
        "21:30:01 - 100 cm\r\n21:30:02 - 100 cm\r\n21:30:03 - 100 cm\r\n"
    );
    assert_eq!(rig.pulses(), 3);
}

#[test]
fn s2_half_meter_echo_settles_early() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    rig.sensor.set(Sensor::Echo(2_915));
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    bench.run_until(Duration::from_secs(1));
    assert_eq!(rig.take_output(), format!("{STARTED}21:30:01 - 50 cm\r\n"));
    // The cycle ends with the falling edge, not with the echo wait.
    assert!(Instant::now() < at(Duration::from_millis(1_005)));
}

#[test]
fn s3_no_echo_reports_falha() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    rig.sensor.set(Sensor::Silent);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    bench.run_until(Duration::from_secs(1));
    assert_eq!(rig.take_output(), format!("{STARTED}21:30:01 - Falha\r\n"));
    assert!(Instant::now() <= at(Duration::from_millis(1_100)));
    // The report consumed the result.
    assert_eq!(channel.peek(), EchoResult::Idle);
}

#[test]
fn echo_without_falling_edge_times_out() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    rig.sensor.set(Sensor::Stuck);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    bench.run_until(Duration::from_secs(1));
    assert_eq!(rig.take_output(), format!("{STARTED}21:30:01 - Falha\r\n"));
    // The capture alarm settles the cycle before the echo wait runs out.
    let ended = Instant::now();
    assert!(ended >= at(Duration::from_millis(1_030)), "{ended:?}");
    assert!(ended < at(Duration::from_millis(1_035)), "{ended:?}");
}

#[test]
fn s4_stop_silences_measurements() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    bench.run_until(Duration::from_millis(3_500));
    bench.type_line("STOP\n");
    assert!(rig.take_output().ends_with(&format!("21:30:03 - 100 cm\r\n{PAUSED}")));
    let before = rig.pulses();
    assert_eq!(before, 3);

    bench.run_until(Duration::from_secs(8));
    assert_eq!(rig.take_output(), "");
    assert_eq!(rig.pulses(), before);
}

#[test]
fn quiescent_until_started() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.run_until(Duration::from_secs(5));
    // Stray echoes while inactive never reach the channel.
    let now = Instant::now();
    rig.edges.borrow_mut().extend([
        (now + Duration::from_micros(100), Edge::Rising),
        (now + Duration::from_micros(1_100), Edge::Falling),
    ]);
    bench.run_until(Duration::from_secs(7));

    assert_eq!(rig.take_output(), "");
    assert_eq!(rig.pulses(), 0);
    assert_eq!(channel.peek(), EchoResult::Idle);
}

#[test]
fn s5_unknown_command() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("hello\n");
    assert_eq!(rig.take_output(), UNKNOWN_HELLO);
    assert!(!bench.supervisor.is_active());

    bench.run_until(Duration::from_secs(2));
    assert_eq!(rig.take_output(), "");
}

#[test]
fn s6_overlong_line_is_unknown() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("startstartstartstartstartstartstartstart\n");
    assert_eq!(
        rig.take_output(),
        "Comando desconhecido: startstartstartstar\r\nComandos disponíveis: 'start', 'stop'\r\n"
    );
    assert!(!bench.supervisor.is_active());
}

#[test]
fn reply_precedes_due_report_in_one_pass() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\nhello");
    assert_eq!(rig.take_output(), STARTED);

    // Two periods pass while the loop is held up; the line ends on the pass that is due.
    MockDriver::get().advance(Duration::from_secs(2));
    bench.send("\n");
    bench.step();
    assert_eq!(rig.take_output(), format!("{UNKNOWN_HELLO}21:30:01 - 100 cm\r\n"));
    assert_eq!(rig.pulses(), 1);
}

#[test]
fn stop_on_due_pass_suppresses_measurement() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\nstop");
    assert_eq!(rig.take_output(), STARTED);

    MockDriver::get().advance(Duration::from_secs(2));
    bench.send("\n");
    bench.step();
    assert_eq!(rig.take_output(), PAUSED);
    assert_eq!(rig.pulses(), 0);
}

#[test]
fn trigger_cadence_stays_near_one_second() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    let mut until = Duration::from_secs(0);
    for sensor in [Sensor::Echo(23_000), Sensor::Stuck, Sensor::Silent] {
        rig.sensor.set(sensor);
        until += Duration::from_secs(4);
        bench.run_until(until);
    }

    let fired = rig.fired.borrow();
    assert!(fired.len() >= 11, "{}", fired.len());
    let slack = config.console_poll * 2;
    for pair in fired.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= config.measurement_period, "{gap:?}");
        assert!(gap <= config.measurement_period + slack, "{gap:?}");
    }
}

#[test]
fn repeated_start_keeps_single_cadence() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    bench.run_until(Duration::from_millis(2_500));
    assert_eq!(rig.pulses(), 2);

    bench.type_line("start\n");
    assert_eq!(rig.take_output().matches(STARTED).count(), 2);
    bench.run_until(Duration::from_millis(4_500));
    assert_eq!(rig.pulses(), 4);
}

#[test]
fn stamps_follow_wall_clock() {
    let _driver = fresh_driver();
    let config = TimingConfig::default();
    let channel = EchoChannel::new();
    let rig = Rig::new(&channel, &config);
    let mut bench = Bench::new(&rig, config);

    bench.type_line("start\n");
    rig.take_output();
    bench.run_until(Duration::from_secs(61));

    let output = rig.take_output();
    let stamps: Vec<&str> = output
        .lines()
        .map(|l| l.split(" - ").next().unwrap())
        .collect();
    assert_eq!(stamps.len(), 60);
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{stamps:?}");
    assert_eq!(stamps.first(), Some(&"21:30:01"));
    assert_eq!(stamps.last(), Some(&"21:31:00"));
}
