//! Testing utilities and mock implementations
//!
//! Mock register layers for the DMA controller, clock, IRQ controller,
//! pinmux and peripheral ports, plus recording callbacks, so the streaming
//! engine and the facades run on the host.
//!
//! Host buffers reach the DMA with their pointer folded below
//! `0x8000_0000`. [`TEST_MAP`] keeps peripheral FIFOs and PSRAM at the top
//! of the 32-bit space and maps `0..=0xBFFF_FFFF` as SRAM, so a folded
//! buffer of any descriptor length always classifies as SRAM.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::sync::atomic::{AtomicU64, Ordering};
use std::boxed::Box;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::dma::{
    Channel, Completion, DmaController, DmaHal, HwDescriptor, MemoryMap, PeripheralClass,
    Region, RegionKind,
};
use crate::driver::config::PeripheralHw;
use crate::driver::device::Platform;
use crate::hal::clock::{ClockControl, ClockDomain, ClockGate};
use crate::hal::irq::{IrqController, IrqHandler, IrqLine};
use crate::hal::pinmux::{Direction, PinAssignment, PinMux, Pull};
use crate::hal::port::{PortControl, PortSetting, StreamDir};
use crate::internal::constants::DMA_CHANNELS;
use crate::stream::{RxCallback, RxPacket, StopReason, TxCallback, TxStatus, Wiring};

// =============================================================================
// Address map
// =============================================================================

/// Byte-wide transmit FIFO.
pub const TX_FIFO_UART: u32 = 0xFFFF_0000;
/// Byte-wide receive FIFO.
pub const RX_FIFO_UART: u32 = 0xFFFF_0004;
/// Word-wide transmit FIFO.
pub const TX_FIFO_WORD: u32 = 0xFFFF_1000;
/// Word-wide receive FIFO.
pub const RX_FIFO_WORD: u32 = 0xFFFF_1004;
/// Start of the fake PSRAM window.
pub const PSRAM_BASE: u32 = 0xFFFE_0000;

pub const REQ_UART_TX: u8 = 1;
pub const REQ_UART_RX: u8 = 0;
pub const REQ_WORD_TX: u8 = 11;
pub const REQ_WORD_RX: u8 = 10;

/// Clock gate bit used by every test peripheral.
pub const CLOCK_BIT: u32 = 5;
pub const CLOCK_MASK: u32 = 1 << CLOCK_BIT;

pub const APB_HZ: u32 = 40_000_000;
pub const AUDIO_HZ: u32 = 160_000_000;
pub const CPU_HZ: u32 = 240_000_000;

const TEST_REGIONS: [Region; 4] = [
    Region::new(
        0xFFFF_0000,
        0xFFFF_00FF,
        RegionKind::Peripheral(PeripheralClass::Uart),
    ),
    Region::new(
        0xFFFF_0100,
        0xFFFF_FFFF,
        RegionKind::Peripheral(PeripheralClass::Word),
    ),
    Region::new(PSRAM_BASE, 0xFFFE_FFFF, RegionKind::Psram),
    Region::new(0, 0xBFFF_FFFF, RegionKind::Sram),
];

pub const TEST_MAP: MemoryMap = MemoryMap::new(&TEST_REGIONS);

pub static I2S_HW: PeripheralHw = PeripheralHw {
    name: "i2s",
    tx_fifo: TX_FIFO_WORD,
    rx_fifo: RX_FIFO_WORD,
    tx_request: REQ_WORD_TX,
    rx_request: REQ_WORD_RX,
    clock_mask: CLOCK_MASK,
    pins: &[
        PinAssignment::output(24, 0),
        PinAssignment::output(25, 0),
        PinAssignment::input(27, 0),
    ],
};

pub static UART_HW: PeripheralHw = PeripheralHw {
    name: "uart0",
    tx_fifo: TX_FIFO_UART,
    rx_fifo: RX_FIFO_UART,
    tx_request: REQ_UART_TX,
    rx_request: REQ_UART_RX,
    clock_mask: CLOCK_MASK,
    pins: &[PinAssignment::output(35, 0), PinAssignment::input(36, 0)],
};

pub static ADC_HW: PeripheralHw = PeripheralHw {
    name: "adc",
    tx_fifo: 0,
    rx_fifo: RX_FIFO_WORD,
    tx_request: 0,
    rx_request: REQ_WORD_RX,
    clock_mask: CLOCK_MASK,
    pins: &[],
};

pub static PWM_HW: PeripheralHw = PeripheralHw {
    name: "pwm",
    tx_fifo: TX_FIFO_WORD,
    rx_fifo: 0,
    tx_request: REQ_WORD_TX,
    rx_request: 0,
    clock_mask: CLOCK_MASK,
    pins: &[PinAssignment::output(16, 2)],
};

/// Leak a value to get a `&'static` fixture.
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// Leak a copy of `bytes`.
pub fn leak_bytes(bytes: &[u8]) -> &'static [u8] {
    Box::leak(bytes.to_vec().into_boxed_slice())
}

// =============================================================================
// Mock DMA controller
// =============================================================================

#[derive(Default)]
struct MockChannel {
    queue: VecDeque<HwDescriptor>,
    programmed: usize,
    running: bool,
    stuck: bool,
    irq: bool,
    starts: usize,
    completion: Option<Completion>,
}

/// DMA register layer with a fixed-depth descriptor queue per channel.
///
/// Nothing moves until the test calls [`complete`](Self::complete).
pub struct MockDmaHal {
    depth: usize,
    channels: [MockChannel; DMA_CHANNELS],
}

impl MockDmaHal {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            channels: core::array::from_fn(|_| MockChannel::default()),
        }
    }

    fn ch(&self, channel: Channel) -> &MockChannel {
        &self.channels[channel.index() as usize]
    }

    fn ch_mut(&mut self, channel: Channel) -> &mut MockChannel {
        &mut self.channels[channel.index() as usize]
    }

    /// Descriptors waiting in the hardware queue, head first.
    pub fn queued(&self, channel: Channel) -> Vec<HwDescriptor> {
        self.ch(channel).queue.iter().copied().collect()
    }

    pub fn irq_enabled(&self, channel: Channel) -> bool {
        self.ch(channel).irq
    }

    /// Number of `start` calls.
    pub fn starts(&self, channel: Channel) -> usize {
        self.ch(channel).starts
    }

    /// Length of the last chain passed to `program_list`.
    pub fn programmed_len(&self, channel: Channel) -> usize {
        self.ch(channel).programmed
    }

    /// Make the channel ignore `halt`.
    pub fn set_stuck(&mut self, channel: Channel, stuck: bool) {
        self.ch_mut(channel).stuck = stuck;
    }

    /// Finish the first `n` queued descriptors and latch a completion.
    pub fn complete(&mut self, channel: Channel, n: usize) {
        self.finish(channel, n, None);
    }

    /// Like [`complete`](Self::complete), with the last descriptor cut
    /// short at `tail_len` bytes.
    pub fn complete_short(&mut self, channel: Channel, n: usize, tail_len: usize) {
        self.finish(channel, n, Some(tail_len));
    }

    fn finish(&mut self, channel: Channel, n: usize, tail_len: Option<usize>) {
        let depth = self.depth;
        let ch = self.ch_mut(channel);
        let mut last_tag = None;
        let mut consumed = 0;
        for _ in 0..n {
            let Some(desc) = ch.queue.pop_front() else {
                break;
            };
            last_tag = Some(desc.tag());
            consumed += 1;
        }
        if ch.queue.is_empty() {
            ch.running = false;
        }
        let prev = ch.completion.take().unwrap_or_default();
        ch.completion = Some(Completion {
            consumed: prev.consumed + consumed,
            remained: depth - ch.queue.len(),
            tail_len,
            last_tag: last_tag.or(prev.last_tag),
        });
    }
}

impl DmaHal for MockDmaHal {
    fn load(&mut self, channel: Channel, desc: &HwDescriptor) -> bool {
        let depth = self.depth;
        let ch = self.ch_mut(channel);
        if ch.queue.len() >= depth {
            return false;
        }
        ch.queue.push_back(*desc);
        true
    }

    fn program_list(&mut self, channel: Channel, descs: &[HwDescriptor]) {
        let ch = self.ch_mut(channel);
        ch.queue = descs.iter().copied().collect();
        ch.programmed = descs.len();
    }

    fn start(&mut self, channel: Channel) {
        let ch = self.ch_mut(channel);
        ch.running = true;
        ch.starts += 1;
    }

    fn halt(&mut self, channel: Channel) {
        let ch = self.ch_mut(channel);
        if ch.stuck {
            return;
        }
        ch.queue.clear();
        ch.running = false;
        ch.completion = None;
    }

    fn is_running(&self, channel: Channel) -> bool {
        self.ch(channel).running
    }

    fn free_slots(&self, channel: Channel) -> usize {
        self.depth.saturating_sub(self.ch(channel).queue.len())
    }

    fn take_completion(&mut self, channel: Channel) -> Option<Completion> {
        self.ch_mut(channel).completion.take()
    }

    fn set_irq(&mut self, channel: Channel, enable: bool) {
        self.ch_mut(channel).irq = enable;
    }
}

// =============================================================================
// Mock clock / IRQ / pinmux / port
// =============================================================================

/// RCC register layer.
#[derive(Debug, Default)]
pub struct MockClock {
    gates: u32,
    enable_calls: u32,
    resets: u32,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently open gates.
    pub fn gates(&self) -> u32 {
        self.gates
    }

    pub fn enable_calls(&self) -> u32 {
        self.enable_calls
    }

    /// Every module reset so far, OR-ed together.
    pub fn resets(&self) -> u32 {
        self.resets
    }
}

impl ClockControl for MockClock {
    fn clock_enable(&mut self, mask: u32) {
        self.gates |= mask;
        self.enable_calls += 1;
    }

    fn clock_disable(&mut self, mask: u32) {
        self.gates &= !mask;
    }

    fn clock_reset(&mut self, mask: u32) {
        self.resets |= mask;
    }

    fn get_clock(&self, domain: ClockDomain) -> u32 {
        match domain {
            ClockDomain::Cpu => CPU_HZ,
            ClockDomain::Apb => APB_HZ,
            ClockDomain::Audio => AUDIO_HZ,
        }
    }
}

/// Interrupt controller recording attached and enabled lines (0..64).
#[derive(Debug, Default)]
pub struct MockIrq {
    attached: AtomicU64,
    enabled: AtomicU64,
}

impl MockIrq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, irq: IrqLine) -> bool {
        self.attached.load(Ordering::SeqCst) & (1 << irq) != 0
    }

    pub fn is_enabled(&self, irq: IrqLine) -> bool {
        self.enabled.load(Ordering::SeqCst) & (1 << irq) != 0
    }
}

impl IrqController for MockIrq {
    fn attach_vector(&self, irq: IrqLine, _handler: IrqHandler) {
        self.attached.fetch_or(1 << irq, Ordering::SeqCst);
    }

    fn enable(&self, irq: IrqLine) {
        self.enabled.fetch_or(1 << irq, Ordering::SeqCst);
    }

    fn disable(&self, irq: IrqLine) {
        self.enabled.fetch_and(!(1 << irq), Ordering::SeqCst);
    }
}

/// Pinmux recording the last function, direction and pull per pin.
#[derive(Debug, Default)]
pub struct MockPinMux {
    pins: BTreeMap<u8, (u8, Direction, Pull)>,
}

impl MockPinMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self, pin: u8) -> Option<(u8, Direction, Pull)> {
        self.pins.get(&pin).copied()
    }

    fn entry(&mut self, pin: u8) -> &mut (u8, Direction, Pull) {
        self.pins
            .entry(pin)
            .or_insert((0, Direction::Input, Pull::None))
    }
}

impl PinMux for MockPinMux {
    fn iomux_select(&mut self, pin: u8, function: u8) {
        self.entry(pin).0 = function;
    }

    fn set_direction(&mut self, pin: u8, direction: Direction) {
        self.entry(pin).1 = direction;
    }

    fn set_pull_mode(&mut self, pin: u8, pull: Pull) {
        self.entry(pin).2 = pull;
    }
}

/// Peripheral register layer.
#[derive(Debug, Default)]
pub struct MockPort {
    settings: Mutex<Vec<PortSetting>>,
    requests: Mutex<[bool; 2]>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every setting applied, oldest first.
    pub fn settings(&self) -> Vec<PortSetting> {
        self.settings.lock().unwrap().clone()
    }

    pub fn request_enabled(&self, dir: StreamDir) -> bool {
        self.requests.lock().unwrap()[dir as usize]
    }
}

impl PortControl for MockPort {
    fn apply(&self, setting: PortSetting) {
        self.settings.lock().unwrap().push(setting);
    }

    fn set_dma_request(&self, dir: StreamDir, enable: bool) {
        self.requests.lock().unwrap()[dir as usize] = enable;
    }
}

/// Delay that only counts.
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_us(&self) -> u32 {
        (self.total_ns / 1_000) as u32
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// =============================================================================
// Recording callbacks
// =============================================================================

/// Transmit callback that keeps every returned buffer.
#[derive(Default)]
pub struct RecordingTx {
    events: Mutex<Vec<(&'static [u8], TxStatus)>>,
}

impl RecordingTx {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_status(&self, status: TxStatus) -> Vec<&'static [u8]> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(b, _)| *b)
            .collect()
    }

    /// Buffers returned as [`TxStatus::Done`], in order.
    pub fn done(&self) -> Vec<&'static [u8]> {
        self.with_status(TxStatus::Done)
    }

    /// Buffers returned as [`TxStatus::Aborted`], in order.
    pub fn aborted(&self) -> Vec<&'static [u8]> {
        self.with_status(TxStatus::Aborted)
    }

    pub fn statuses(&self) -> Vec<TxStatus> {
        self.events.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }
}

impl TxCallback<&'static [u8]> for RecordingTx {
    fn on_tx_done(&self, buffer: &'static [u8], status: TxStatus) {
        self.events.lock().unwrap().push((buffer, status));
    }
}

/// Receive callback that holds on to every packet until taken.
#[derive(Default)]
pub struct RecordingRx {
    packets: Mutex<VecDeque<RxPacket>>,
    lengths: Mutex<Vec<usize>>,
    stops: Mutex<Vec<StopReason>>,
}

impl RecordingRx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets delivered so far.
    pub fn count(&self) -> usize {
        self.lengths.lock().unwrap().len()
    }

    /// Filled length of every delivered packet, in order.
    pub fn lengths(&self) -> Vec<usize> {
        self.lengths.lock().unwrap().clone()
    }

    /// Oldest packet not yet taken.
    pub fn take(&self) -> Option<RxPacket> {
        self.packets.lock().unwrap().pop_front()
    }

    pub fn stops(&self) -> Vec<StopReason> {
        self.stops.lock().unwrap().clone()
    }
}

impl RxCallback for RecordingRx {
    fn on_rx_ready(&self, packet: RxPacket) {
        self.lengths.lock().unwrap().push(packet.len());
        self.packets.lock().unwrap().push_back(packet);
    }

    fn on_rx_stopped(&self, reason: StopReason) {
        self.stops.lock().unwrap().push(reason);
    }
}

// =============================================================================
// Test rig
// =============================================================================

/// Default hardware queue depth of the rig's channels.
pub const QUEUE_DEPTH: usize = 4;

/// A leaked DMA controller, clock gate and port, wired together.
pub struct TestRig {
    pub dma: &'static DmaController<MockDmaHal>,
    pub clock: &'static ClockGate<MockClock>,
    pub port: &'static MockPort,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_queue_depth(QUEUE_DEPTH)
    }

    pub fn with_queue_depth(depth: usize) -> Self {
        Self {
            dma: leak(DmaController::new(MockDmaHal::new(depth), TEST_MAP)),
            clock: leak(ClockGate::new(MockClock::new())),
            port: leak(MockPort::new()),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            dma: self.dma,
            clock: self.clock,
            port: self.port,
        }
    }

    /// Wiring for one direction ending at `fifo`.
    pub fn wiring(&self, fifo: u32) -> Wiring {
        let request = match fifo {
            TX_FIFO_UART => REQ_UART_TX,
            RX_FIFO_UART => REQ_UART_RX,
            TX_FIFO_WORD => REQ_WORD_TX,
            _ => REQ_WORD_RX,
        };
        Wiring {
            dma: self.dma,
            clock: self.clock,
            port: self.port,
            fifo,
            request,
            clock_mask: CLOCK_MASK,
        }
    }

    /// Finish `n` descriptors on `channel` and run the interrupt handler.
    pub fn complete(&self, channel: Channel, n: usize) {
        self.dma.with_hal(|h| h.complete(channel, n));
        self.dma.on_interrupt();
    }

    /// [`complete`](Self::complete) with a short last descriptor.
    pub fn complete_short(&self, channel: Channel, n: usize, tail_len: usize) {
        self.dma.with_hal(|h| h.complete_short(channel, n, tail_len));
        self.dma.on_interrupt();
    }
}
