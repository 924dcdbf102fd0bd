//! W800 board configuration.
//!
//! Address map, DMA request lines, clock gate bits and default pin routing
//! for the W800 (XT804 core) and the common W800 module pinout.

use crate::dma::{MemoryMap, PeripheralClass, Region, RegionKind};
use crate::driver::config::PeripheralHw;
use crate::hal::irq::IrqLine;
use crate::hal::pinmux::PinAssignment;

/// W800 constants.
pub struct W800;

impl W800 {
    // =========================================================================
    // Memory map
    // =========================================================================

    /// Execute-in-place flash window (DMA readable).
    pub const FLASH_BASE: u32 = 0x0800_0000;

    /// On-chip SRAM (288 KiB).
    pub const SRAM_BASE: u32 = 0x2000_0000;

    /// Last SRAM address.
    pub const SRAM_END: u32 = 0x2004_7FFF;

    /// External PSRAM window (8 MiB).
    pub const PSRAM_BASE: u32 = 0x3000_0000;

    /// Last PSRAM address.
    pub const PSRAM_END: u32 = 0x307F_FFFF;

    /// UART block (UART0..UART4).
    pub const UART_BASE: u32 = 0x4001_0600;

    // =========================================================================
    // Peripheral FIFOs
    // =========================================================================

    /// UART0 transmit FIFO.
    pub const UART0_TX_FIFO: u32 = 0x4001_0800;
    /// UART0 receive FIFO.
    pub const UART0_RX_FIFO: u32 = 0x4001_0900;
    /// UART1 transmit FIFO.
    pub const UART1_TX_FIFO: u32 = 0x4001_0A00;
    /// UART1 receive FIFO.
    pub const UART1_RX_FIFO: u32 = 0x4001_0B00;
    /// I2S transmit FIFO.
    pub const I2S_TX_FIFO: u32 = 0x4001_2010;
    /// I2S receive FIFO.
    pub const I2S_RX_FIFO: u32 = 0x4001_2014;
    /// SAR ADC result register.
    pub const ADC_RESULT: u32 = 0x4001_0200;
    /// PWM duty FIFO.
    pub const PWM_DUTY_FIFO: u32 = 0x4001_1E40;

    // =========================================================================
    // DMA request lines
    // =========================================================================

    /// UART receive request (UART selected in the DMA request mux).
    pub const REQ_UART_RX: u8 = 0;
    /// UART transmit request.
    pub const REQ_UART_TX: u8 = 1;
    /// PWM request.
    pub const REQ_PWM: u8 = 2;
    /// ADC request.
    pub const REQ_ADC: u8 = 6;
    /// I2S receive request.
    pub const REQ_I2S_RX: u8 = 10;
    /// I2S transmit request.
    pub const REQ_I2S_TX: u8 = 11;

    // =========================================================================
    // Clock gates
    // =========================================================================

    /// UART0 clock gate.
    pub const CLK_UART0: u32 = 1 << 0;
    /// UART1 clock gate.
    pub const CLK_UART1: u32 = 1 << 1;
    /// PWM clock gate.
    pub const CLK_PWM: u32 = 1 << 10;
    /// DMA controller clock gate.
    pub const CLK_DMA: u32 = 1 << 13;
    /// SAR ADC clock gate.
    pub const CLK_ADC: u32 = 1 << 15;
    /// I2S clock gate.
    pub const CLK_I2S: u32 = 1 << 18;

    // =========================================================================
    // Interrupts
    // =========================================================================

    /// Shared DMA completion interrupt.
    pub const DMA_IRQ: IrqLine = 4;

    /// Board name.
    pub const BOARD_NAME: &'static str = "W800";
}

static REGIONS: [Region; 5] = [
    Region::new(
        W800::UART_BASE,
        0x4001_0FFF,
        RegionKind::Peripheral(PeripheralClass::Uart),
    ),
    Region::new(
        0x4000_0000,
        0x4001_FFFF,
        RegionKind::Peripheral(PeripheralClass::Word),
    ),
    Region::new(W800::SRAM_BASE, W800::SRAM_END, RegionKind::Sram),
    Region::new(W800::PSRAM_BASE, W800::PSRAM_END, RegionKind::Psram),
    Region::new(W800::FLASH_BASE, 0x08FF_FFFF, RegionKind::Sram),
];

/// DMA-visible address map of the W800.
pub static MEMORY_MAP: MemoryMap = MemoryMap::new(&REGIONS);

/// I2S on PB08 (BCLK), PB09 (LRCLK), PB10 (DO), PB11 (DI), PA07 (MCLK).
pub static I2S: PeripheralHw = PeripheralHw {
    name: "i2s",
    tx_fifo: W800::I2S_TX_FIFO,
    rx_fifo: W800::I2S_RX_FIFO,
    tx_request: W800::REQ_I2S_TX,
    rx_request: W800::REQ_I2S_RX,
    clock_mask: W800::CLK_I2S,
    pins: &[
        PinAssignment::output(24, 0),
        PinAssignment::output(25, 0),
        PinAssignment::output(26, 0),
        PinAssignment::input(27, 0),
        PinAssignment::output(7, 1),
    ],
};

/// UART0 (console) on PB19 (TX), PB20 (RX).
pub static UART0: PeripheralHw = PeripheralHw {
    name: "uart0",
    tx_fifo: W800::UART0_TX_FIFO,
    rx_fifo: W800::UART0_RX_FIFO,
    tx_request: W800::REQ_UART_TX,
    rx_request: W800::REQ_UART_RX,
    clock_mask: W800::CLK_UART0,
    pins: &[PinAssignment::output(35, 0), PinAssignment::input(36, 0)],
};

/// UART1 on PB06 (TX), PB07 (RX).
pub static UART1: PeripheralHw = PeripheralHw {
    name: "uart1",
    tx_fifo: W800::UART1_TX_FIFO,
    rx_fifo: W800::UART1_RX_FIFO,
    tx_request: W800::REQ_UART_TX,
    rx_request: W800::REQ_UART_RX,
    clock_mask: W800::CLK_UART1,
    pins: &[PinAssignment::output(22, 1), PinAssignment::input(23, 1)],
};

/// SAR ADC, channel 0 on PA01. Receive only.
pub static ADC: PeripheralHw = PeripheralHw {
    name: "adc",
    tx_fifo: 0,
    rx_fifo: W800::ADC_RESULT,
    tx_request: 0,
    rx_request: W800::REQ_ADC,
    clock_mask: W800::CLK_ADC,
    pins: &[PinAssignment {
        pin: 1,
        function: 3,
        direction: crate::hal::pinmux::Direction::Input,
        pull: crate::hal::pinmux::Pull::None,
    }],
};

/// PWM channel 0 on PB00. Transmit only.
pub static PWM: PeripheralHw = PeripheralHw {
    name: "pwm",
    tx_fifo: W800::PWM_DUTY_FIFO,
    rx_fifo: 0,
    tx_request: W800::REQ_PWM,
    rx_request: 0,
    clock_mask: W800::CLK_PWM,
    pins: &[PinAssignment::output(16, 2)],
};
