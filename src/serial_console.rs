use crate::Irqs;
use defmt::{error, info};
use embassy_stm32::Peri;
use embassy_stm32::peripherals::{PA2, PA3, USART2};
use embassy_stm32::usart::{BufferedUart, Config};
use static_cell::StaticCell;

const BAUD_RATE: u32 = 115_200;

static TX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

/// Bring up the console on USART2, which the NUCLEO board routes to the ST-LINK virtual COM port.
///
/// The UART is ring-buffered and interrupt driven, so a read abandoned by a timeout loses no bytes.
pub fn init_console(
    usart: Peri<'static, USART2>,
    rx: Peri<'static, PA3>,
    tx: Peri<'static, PA2>,
    irqs: Irqs,
) -> BufferedUart<'static> {
    let mut config = Config::default();
    config.baudrate = BAUD_RATE;

    let tx_buffer = TX_BUFFER.init([0; 256]);
    let rx_buffer = RX_BUFFER.init([0; 64]);

    match BufferedUart::new(usart, rx, tx, tx_buffer, rx_buffer, irqs, config) {
        Ok(uart) => {
            info!("Console ready at {} baud", BAUD_RATE);
            uart
        }
        Err(e) => {
            error!("Failed to configure console UART: {}", e);
            core::panic!("Console initialization failed");
        }
    }
}
