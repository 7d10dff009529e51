//! MipotModule -- the [`WirelessModule`] implementation for the Mipot
//! 32001353 LoRaWAN module.
//!
//! This module ties the frame codec ([`frame`](crate::frame)), the receiver
//! and the [`Correlator`] to a [`Transport`] and a pair of control pins.
//! Every command runs inside one awake window: the module is woken before
//! the frame is written and put back to sleep on every exit path.
//!
//! Indications that arrive while a command waits for its reply are kept
//! in a bounded queue and handed out by [`MipotModule::get_indication`].

use std::time::Duration;

use async_trait::async_trait;
use embedded_hal::digital::{OutputPin, PinState};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use wmodlib_core::error::{Error, Result};
use wmodlib_core::events::Indication;
use wmodlib_core::helpers::format_hex;
use wmodlib_core::module::{ModuleInfo, WirelessModule};
use wmodlib_core::pins::{PinConfiguration, drive};
use wmodlib_core::transport::Transport;

use crate::awake::AwakeWindow;
use crate::commands::{
    self, ActivationStatus, ChannelStatus, Command, JoinMode, JoinStatus, TIMEOUT_APP_KEY,
    TIMEOUT_CH_PARAMETERS, TIMEOUT_DEFAULT, TIMEOUT_EEPROM, TxStatus,
};
use crate::correlator::Correlator;
use crate::eeprom::{self, LoRaWanClass, NetworkType};
use crate::frame::{DecodedFrame, reply_code};
use crate::indications::parse_indication;
use crate::queue::IndicationQueue;
use crate::receiver;

/// Identification of the Mipot 32001353.
pub const MIPOT_32001353: ModuleInfo = ModuleInfo {
    manufacturer: "Mipot",
    model: "32001353",
};

/// Pin timing of one module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timing {
    /// Pause between waking the module and writing to it.
    pub wake_delay: Duration,
    /// How long the reset line is held low.
    pub reset_pulse: Duration,
    /// Time the module needs after a reset before it accepts commands.
    pub reset_settle: Duration,
}

/// State touched by a transaction. Guarded by one mutex so transactions
/// never interleave.
struct Session<W, R> {
    transport: Box<dyn Transport>,
    pins: PinConfiguration<W, R>,
    queue: IndicationQueue,
}

/// A Mipot 32001353 module attached over a serial link.
///
/// Constructed via [`MipotBuilder`](crate::builder::MipotBuilder). Methods
/// take `&self` and may be called from several tasks; calls are served one
/// at a time.
pub struct MipotModule<W, R> {
    session: Mutex<Session<W, R>>,
    correlator: Correlator,
    timing: Timing,
    info: ModuleInfo,
}

impl<W, R> MipotModule<W, R>
where
    W: OutputPin + Send,
    R: OutputPin + Send,
{
    /// Create a module from its parts.
    ///
    /// Called by the builder, which has already driven the pins idle.
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        pins: PinConfiguration<W, R>,
        queue: IndicationQueue,
        correlator: Correlator,
        timing: Timing,
    ) -> Self {
        MipotModule {
            session: Mutex::new(Session {
                transport,
                pins,
                queue,
            }),
            correlator,
            timing,
            info: MIPOT_32001353,
        }
    }

    /// Write `command` and wait for its reply inside one awake window.
    async fn transact(
        &self,
        command: &Command,
        expected_len: Option<u8>,
        timeout: Duration,
    ) -> Result<DecodedFrame> {
        let wire = command.encode()?;

        let mut session = self.session.lock().await;
        let Session {
            transport,
            pins,
            queue,
        } = &mut *session;

        let window = AwakeWindow::open(&mut pins.wakeup, self.timing.wake_delay).await?;
        debug!("command 0x{:02X}", command.code);
        trace!("tx {}", format_hex(&wire));
        let result = match transport.send(&wire).await {
            Ok(()) => {
                self.correlator
                    .request_reply(
                        transport.as_mut(),
                        queue,
                        command.code,
                        expected_len,
                        timeout,
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        let released = window.close();

        let reply = result?;
        released?;
        // Best effort may hand back an indication seen while waiting.
        if reply.code != reply_code(command.code) {
            return Err(Error::Protocol(format!(
                "no reply to command 0x{:02X}, last frame was 0x{:02X}",
                command.code, reply.code
            )));
        }
        trace!("reply 0x{:02X}: {}", reply.code, format_hex(&reply.payload));
        Ok(reply)
    }

    async fn transact_status(&self, command: &Command, timeout: Duration) -> Result<u8> {
        let reply = self.transact(command, Some(1), timeout).await?;
        commands::parse_status(&reply.payload)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Read the firmware version.
    pub async fn get_fw_version(&self) -> Result<u32> {
        let reply = self
            .transact(&commands::cmd_get_fw_version(), Some(4), TIMEOUT_DEFAULT)
            .await?;
        commands::parse_u32_le(&reply.payload)
    }

    /// Read the module serial number.
    pub async fn get_serial_no(&self) -> Result<u32> {
        let reply = self
            .transact(&commands::cmd_get_serial_no(), Some(4), TIMEOUT_DEFAULT)
            .await?;
        commands::parse_u32_le(&reply.payload)
    }

    /// Read the device EUI, most significant byte first.
    pub async fn get_deveui(&self) -> Result<[u8; 8]> {
        let reply = self
            .transact(&commands::cmd_get_deveui(), Some(8), TIMEOUT_DEFAULT)
            .await?;
        commands::parse_eui(&reply.payload)
    }

    /// Read the network activation state.
    pub async fn get_activation_status(&self) -> Result<ActivationStatus> {
        let status = self
            .transact_status(&commands::cmd_get_activation_status(), TIMEOUT_DEFAULT)
            .await?;
        Ok(ActivationStatus::from(status))
    }

    // -----------------------------------------------------------------
    // Network
    // -----------------------------------------------------------------

    /// Store the 16-byte OTAA application key, most significant byte first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key is not 16 bytes long.
    pub async fn set_app_key(&self, app_key: &[u8]) -> Result<()> {
        let command = commands::cmd_set_app_key(app_key)?;
        self.transact(&command, Some(0), TIMEOUT_APP_KEY).await?;
        Ok(())
    }

    /// Start joining the network.
    ///
    /// The outcome of the join itself arrives later as a join indication,
    /// see [`wait_for_join`](Self::wait_for_join).
    pub async fn join(&self, mode: JoinMode) -> Result<JoinStatus> {
        let status = self
            .transact_status(&commands::cmd_join(mode), TIMEOUT_DEFAULT)
            .await?;
        Ok(JoinStatus::from(status))
    }

    /// Queue an uplink on `fport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `fport` is outside 1-223 or
    /// `data` is empty or longer than 209 bytes. Nothing is sent then.
    pub async fn tx_msg(&self, data: &[u8], fport: u8, confirmed: bool) -> Result<TxStatus> {
        let command = commands::cmd_tx_msg(data, fport, confirmed)?;
        let status = self.transact_status(&command, TIMEOUT_DEFAULT).await?;
        Ok(TxStatus::from(status))
    }

    /// Configure one channel of the channel plan.
    ///
    /// See [`cmd_set_ch_parameters`](commands::cmd_set_ch_parameters) for
    /// the validation rules.
    pub async fn set_ch_parameters(
        &self,
        channel: u8,
        frequency_hz: u32,
        min_data_rate: u8,
        max_data_rate: u8,
        enabled: bool,
    ) -> Result<ChannelStatus> {
        let command = commands::cmd_set_ch_parameters(
            channel,
            frequency_hz,
            min_data_rate,
            max_data_rate,
            enabled,
        )?;
        let status = self
            .transact_status(&command, TIMEOUT_CH_PARAMETERS)
            .await?;
        Ok(ChannelStatus::from(status))
    }

    // -----------------------------------------------------------------
    // EEPROM
    // -----------------------------------------------------------------

    /// Write `data` to EEPROM starting at `start`.
    ///
    /// Returns `true` if the module reported success.
    pub async fn eeprom_write(&self, start: u8, data: &[u8]) -> Result<bool> {
        let command = commands::cmd_eeprom_write(start, data)?;
        let status = self.transact_status(&command, TIMEOUT_EEPROM).await?;
        Ok(status == 0x00)
    }

    /// Read `len` EEPROM bytes starting at `start`.
    ///
    /// Returns `None` if the module reported a failure or the reply had an
    /// unexpected length.
    pub async fn eeprom_read(&self, start: u8, len: u8) -> Result<Option<Vec<u8>>> {
        let command = commands::cmd_eeprom_read(start, len)?;
        let reply = self.transact(&command, None, TIMEOUT_EEPROM).await?;
        Ok(commands::parse_eeprom_read(&reply.payload, len))
    }

    async fn eeprom_read_exact(&self, start: u8, len: u8) -> Result<Vec<u8>> {
        self.eeprom_read(start, len).await?.ok_or_else(|| {
            Error::Protocol(format!(
                "EEPROM read of {len} bytes at 0x{start:02X} failed"
            ))
        })
    }

    async fn eeprom_read_byte(&self, addr: u8) -> Result<u8> {
        let data = self.eeprom_read_exact(addr, 1).await?;
        data.first().copied().ok_or_else(|| {
            Error::Protocol(format!("EEPROM read at 0x{addr:02X} returned no data"))
        })
    }

    /// Read the join EUI, most significant byte first.
    pub async fn get_join_eui(&self) -> Result<[u8; 8]> {
        let data = self.eeprom_read_exact(eeprom::ADDR_JOIN_EUI, 8).await?;
        commands::parse_eui(&data)
    }

    /// Read the configured LoRaWAN device class.
    pub async fn get_class(&self) -> Result<LoRaWanClass> {
        Ok(LoRaWanClass::from(
            self.eeprom_read_byte(eeprom::ADDR_CLASS).await?,
        ))
    }

    /// Returns `true` if adaptive data rate is enabled.
    pub async fn get_adr(&self) -> Result<bool> {
        Ok(self.eeprom_read_byte(eeprom::ADDR_ADR).await? != 0)
    }

    /// Number of transmissions of each unconfirmed uplink.
    pub async fn get_unconfirmed_repeat(&self) -> Result<u8> {
        self.eeprom_read_byte(eeprom::ADDR_UNCONFIRMED_REPEAT).await
    }

    /// Read whether the module is set up for a public or private network.
    pub async fn get_network_type(&self) -> Result<NetworkType> {
        Ok(NetworkType::from(
            self.eeprom_read_byte(eeprom::ADDR_NETWORK_TYPE).await?,
        ))
    }

    // -----------------------------------------------------------------
    // Indications
    // -----------------------------------------------------------------

    /// Number of indications waiting in the queue.
    pub async fn pending_indications(&self) -> usize {
        self.session.lock().await.queue.len()
    }

    /// Return the next indication.
    ///
    /// Queued indications are returned first. Otherwise the module is
    /// woken and the line is watched for up to `timeout`; the module is
    /// left awake so that it keeps reporting. Returns `None` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedReply`] if a command reply arrives
    /// instead, and [`Error::InvalidArgument`] for a zero timeout when the
    /// queue is empty.
    pub async fn get_indication(&self, timeout: Duration) -> Result<Option<DecodedFrame>> {
        let mut session = self.session.lock().await;
        if let Some(frame) = session.queue.try_dequeue() {
            return Ok(Some(frame));
        }
        ensure_timeout(timeout)?;

        let Session {
            transport, pins, ..
        } = &mut *session;
        drive(&mut pins.wakeup, "wakeup", PinState::Low)?;

        match receiver::receive(transport.as_mut(), Instant::now() + timeout, None).await {
            Ok((frame, true)) => Ok(Some(frame)),
            Ok((frame, false)) => Err(Error::UnexpectedReply(frame.code)),
            Err(Error::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`get_indication`](Self::get_indication), parsed into an
    /// [`Indication`].
    pub async fn get_parsed_indication(&self, timeout: Duration) -> Result<Option<Indication>> {
        match self.get_indication(timeout).await? {
            Some(frame) => parse_indication(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Wait for the result of a join.
    ///
    /// Other indications received meanwhile are discarded. Returns `None`
    /// if no join indication arrived within `timeout`.
    pub async fn wait_for_join(&self, timeout: Duration) -> Result<Option<bool>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.get_parsed_indication(remaining).await? {
                Some(Indication::Join { success }) => return Ok(Some(success)),
                Some(other) => debug!("discarding {} indication while joining", other.name()),
                None => return Ok(None),
            }
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Reset the module by command and wait until it is ready again.
    ///
    /// The module does not reply to a reset.
    pub async fn soft_reset(&self) -> Result<()> {
        let wire = commands::cmd_reset().encode()?;

        let mut session = self.session.lock().await;
        let Session {
            transport, pins, ..
        } = &mut *session;

        let window = AwakeWindow::open(&mut pins.wakeup, self.timing.wake_delay).await?;
        debug!("soft reset");
        let sent = transport.send(&wire).await;
        let released = window.close();
        sent?;
        released?;

        tokio::time::sleep(self.timing.reset_settle).await;
        Ok(())
    }

    /// Put the module to sleep and close the transport.
    pub async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        drive(&mut session.pins.wakeup, "wakeup", PinState::High)?;
        session.transport.close().await
    }
}

fn ensure_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::InvalidArgument(
            "timeout must be greater than zero".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl<W, R> WirelessModule for MipotModule<W, R>
where
    W: OutputPin + Send,
    R: OutputPin + Send,
{
    type Pins = PinConfiguration<W, R>;
    type Command = Command;
    type Frame = DecodedFrame;

    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    async fn set_pin_configuration(&self, pins: Self::Pins) -> Result<()> {
        let mut pins = pins;
        pins.set_idle()?;
        self.session.lock().await.pins = pins;
        Ok(())
    }

    async fn sleep(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        drive(&mut session.pins.wakeup, "wakeup", PinState::High)
    }

    async fn wakeup(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        drive(&mut session.pins.wakeup, "wakeup", PinState::Low)
    }

    async fn reset(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        debug!("hard reset");
        drive(&mut session.pins.reset, "reset", PinState::Low)?;
        tokio::time::sleep(self.timing.reset_pulse).await;
        drive(&mut session.pins.reset, "reset", PinState::High)?;
        tokio::time::sleep(self.timing.reset_settle).await;
        Ok(())
    }

    async fn transmit(&self, command: &Command) -> Result<()> {
        let wire = command.encode()?;
        let mut session = self.session.lock().await;
        drive(&mut session.pins.wakeup, "wakeup", PinState::Low)?;
        tokio::time::sleep(self.timing.wake_delay).await;
        trace!("tx {}", format_hex(&wire));
        session.transport.send(&wire).await
    }

    async fn receive(
        &self,
        timeout: Duration,
        expected: Option<u8>,
    ) -> Result<(DecodedFrame, bool)> {
        ensure_timeout(timeout)?;
        let mut session = self.session.lock().await;
        receiver::receive(
            session.transport.as_mut(),
            Instant::now() + timeout,
            expected,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmodlib_test_harness::{MockPin, MockTransport, SentLog};

    use crate::builder::MipotBuilder;
    use crate::correlator::ReplyPolicy;
    use crate::frame::encode_frame;

    type TestModule = MipotModule<MockPin, MockPin>;

    /// Probes kept by the test while the module owns the pins.
    struct Probes {
        wake: MockPin,
        reset: MockPin,
        sent: SentLog,
    }

    async fn make_module(mock: MockTransport) -> (TestModule, Probes) {
        make_module_with(mock, MipotBuilder::new()).await
    }

    async fn make_module_with(mock: MockTransport, builder: MipotBuilder) -> (TestModule, Probes) {
        let wake = MockPin::new();
        let reset = MockPin::new();
        let sent = mock.sent_log();
        let module = builder
            .build_with_transport(
                Box::new(mock),
                PinConfiguration::new(wake.clone(), reset.clone()),
            )
            .await
            .unwrap();
        wake.clear_history();
        reset.clear_history();
        (module, Probes { wake, reset, sent })
    }

    fn wire(command: Command) -> Vec<u8> {
        command.encode().unwrap()
    }

    /// Concatenate several encoded frames into one inbound chunk.
    fn frames(list: &[(u8, &[u8])]) -> Vec<u8> {
        list.iter()
            .flat_map(|(code, payload)| encode_frame(*code, payload).unwrap())
            .collect()
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_get_fw_version() {
        let mut mock = MockTransport::new();
        mock.expect(
            &[0xAA, 0x34, 0x00, 0x22],
            &[0xAA, 0xB4, 0x04, 0x78, 0x56, 0x34, 0x12, 0x8A],
        );

        let (module, probes) = make_module(mock).await;
        assert_eq!(module.get_fw_version().await.unwrap(), 0x1234_5678);

        assert_eq!(probes.sent.len(), 1);
        assert_eq!(probes.wake.history(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_serial_no() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_get_serial_no()),
            &frames(&[(0xB5, &[0x01, 0x00, 0x00, 0x00])]),
        );

        let (module, _) = make_module(mock).await;
        assert_eq!(module.get_serial_no().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_deveui_reversed() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_get_deveui()),
            &frames(&[(0xB6, &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01])]),
        );

        let (module, _) = make_module(mock).await;
        assert_eq!(
            module.get_deveui().await.unwrap(),
            [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_activation_status() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_get_activation_status()),
            &frames(&[(0xC2, &[0x02])]),
        );

        let (module, _) = make_module(mock).await;
        assert_eq!(
            module.get_activation_status().await.unwrap(),
            ActivationStatus::Joined
        );
    }

    // -----------------------------------------------------------------
    // Network
    // -----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_tx_msg_with_indication_before_reply() {
        let mut mock = MockTransport::new();
        let request = wire(commands::cmd_tx_msg(&[0xDE, 0xAD], 1, true).unwrap());
        assert_eq!(&request[..7], &[0xAA, 0x46, 0x04, 0x01, 0x01, 0xDE, 0xAD]);
        mock.expect(&request, &frames(&[(0x48, &[0x00]), (0xC6, &[0x00])]));

        let (module, probes) = make_module(mock).await;
        assert_eq!(
            module.tx_msg(&[0xDE, 0xAD], 1, true).await.unwrap(),
            TxStatus::Success
        );
        assert_eq!(module.pending_indications().await, 1);
        assert_eq!(probes.wake.history(), vec![false, true]);

        let indication = module
            .get_indication(Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(indication.code, 0x48);
        assert_eq!(module.pending_indications().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tx_msg_indication_without_reply_is_error() {
        let mut mock = MockTransport::new();
        let request = wire(commands::cmd_tx_msg(&[0xDE, 0xAD], 1, false).unwrap());
        mock.expect(&request, &frames(&[(0x48, &[0x00])]));

        let (module, probes) = make_module(mock).await;
        let err = module.tx_msg(&[0xDE, 0xAD], 1, false).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(module.pending_indications().await, 1);
        assert!(probes.wake.is_high());

        let indication = module
            .get_indication(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(indication.code, 0x48);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_status_ignores_join_indication() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_get_activation_status()),
            &frames(&[(0x41, &[0x02])]),
        );

        let (module, _) = make_module(mock).await;
        let err = module.get_activation_status().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(module.pending_indications().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tx_msg_invalid_port_sends_nothing() {
        let (module, probes) = make_module(MockTransport::new()).await;
        let err = module.tx_msg(&[0x01], 0, false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(probes.sent.is_empty());
        assert!(probes.wake.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join() {
        let mut mock = MockTransport::new();
        mock.expect(&wire(commands::cmd_join(JoinMode::Otaa)), &frames(&[(0xC0, &[0x02])]));

        let (module, _) = make_module(mock).await;
        assert_eq!(module.join(JoinMode::Otaa).await.unwrap(), JoinStatus::Busy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_app_key() {
        let key: Vec<u8> = (1..=16).collect();
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_set_app_key(&key).unwrap()),
            &frames(&[(0xC3, &[])]),
        );

        let (module, probes) = make_module(mock).await;
        module.set_app_key(&key).await.unwrap();
        assert_eq!(probes.sent.frames()[0][3], 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ch_parameters() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_set_ch_parameters(3, 867_100_000, 0, 5, true).unwrap()),
            &frames(&[(0xD7, &[0xF4])]),
        );

        let (module, _) = make_module(mock).await;
        let status = module
            .set_ch_parameters(3, 867_100_000, 0, 5, true)
            .await
            .unwrap();
        assert_eq!(status, ChannelStatus::MacBusy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ch_parameters_rejects_fixed_channel() {
        let (module, probes) = make_module(MockTransport::new()).await;
        let err = module
            .set_ch_parameters(2, 867_100_000, 0, 5, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(probes.sent.is_empty());
        assert!(probes.wake.history().is_empty());
    }

    // -----------------------------------------------------------------
    // Failure paths
    // -----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_no_reply_leaves_module_asleep() {
        let mut mock = MockTransport::new();
        mock.expect(&wire(commands::cmd_get_fw_version()), &[]);

        let (module, probes) = make_module(mock).await;
        let start = Instant::now();
        let err = module.get_fw_version().await.unwrap_err();

        assert!(matches!(
            err,
            Error::NoReplyAfterRetries {
                command: 0x34,
                attempts: 8
            }
        ));
        assert_eq!(start.elapsed(), Duration::from_millis(1) + TIMEOUT_DEFAULT * 8);
        assert!(probes.wake.is_high());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_reply_is_protocol_error_under_best_effort() {
        let mut mock = MockTransport::new();
        let short = frames(&[(0xB4, &[0x01])]);
        mock.expect(&wire(commands::cmd_get_fw_version()), &short.repeat(8));

        let (module, probes) = make_module(mock).await;
        let err = module.get_fw_version().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(probes.wake.is_high());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_reports_missing_reply() {
        let mut mock = MockTransport::new();
        let short = frames(&[(0xB4, &[0x01])]);
        mock.expect(&wire(commands::cmd_get_fw_version()), &short.repeat(2));

        let builder = MipotBuilder::new()
            .max_retries(2)
            .reply_policy(ReplyPolicy::Strict);
        let (module, _) = make_module_with(mock, builder).await;
        let err = module.get_fw_version().await.unwrap_err();
        assert!(matches!(err, Error::NoReplyAfterRetries { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_transaction_leaves_module_asleep() {
        let mut mock = MockTransport::new();
        mock.expect(&wire(commands::cmd_get_fw_version()), &[]);

        let (module, probes) = make_module(mock).await;
        let result =
            tokio::time::timeout(Duration::from_millis(100), module.get_fw_version()).await;
        assert!(result.is_err());
        assert_eq!(probes.wake.history(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_pin_failure_sends_nothing() {
        let (module, probes) = make_module(MockTransport::new()).await;
        probes.wake.set_failing(true);

        let err = module.get_fw_version().await.unwrap_err();
        assert!(matches!(err, Error::Pin(_)));
        assert!(probes.sent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transactions_are_serialized() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_get_fw_version()),
            &frames(&[(0xB4, &[0x04, 0x03, 0x02, 0x01])]),
        );
        mock.expect(
            &wire(commands::cmd_get_serial_no()),
            &frames(&[(0xB5, &[0x0A, 0x00, 0x00, 0x00])]),
        );

        let (module, _) = make_module(mock).await;
        let (fw, serial) = tokio::join!(module.get_fw_version(), module.get_serial_no());
        assert_eq!(fw.unwrap(), 0x0102_0304);
        assert_eq!(serial.unwrap(), 10);
    }

    // -----------------------------------------------------------------
    // EEPROM
    // -----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_eeprom_write() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_eeprom_write(0x20, &[0x01]).unwrap()),
            &frames(&[(0xB2, &[0x00])]),
        );
        mock.expect(
            &wire(commands::cmd_eeprom_write(0x20, &[0x01]).unwrap()),
            &frames(&[(0xB2, &[0x01])]),
        );

        let (module, _) = make_module(mock).await;
        assert!(module.eeprom_write(0x20, &[0x01]).await.unwrap());
        assert!(!module.eeprom_write(0x20, &[0x01]).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eeprom_read() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_eeprom_read(0x25, 2).unwrap()),
            &frames(&[(0xB3, &[0x00, 0x03, 0x04])]),
        );
        mock.expect(
            &wire(commands::cmd_eeprom_read(0x25, 2).unwrap()),
            &frames(&[(0xB3, &[0x01])]),
        );

        let (module, _) = make_module(mock).await;
        assert_eq!(
            module.eeprom_read(0x25, 2).await.unwrap(),
            Some(vec![0x03, 0x04])
        );
        assert_eq!(module.eeprom_read(0x25, 2).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eeprom_readers() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_eeprom_read(eeprom::ADDR_JOIN_EUI, 8).unwrap()),
            &frames(&[(0xB3, &[0x00, 8, 7, 6, 5, 4, 3, 2, 1])]),
        );
        mock.expect(
            &wire(commands::cmd_eeprom_read(eeprom::ADDR_CLASS, 1).unwrap()),
            &frames(&[(0xB3, &[0x00, 0x01])]),
        );
        mock.expect(
            &wire(commands::cmd_eeprom_read(eeprom::ADDR_ADR, 1).unwrap()),
            &frames(&[(0xB3, &[0x00, 0x01])]),
        );
        mock.expect(
            &wire(commands::cmd_eeprom_read(eeprom::ADDR_UNCONFIRMED_REPEAT, 1).unwrap()),
            &frames(&[(0xB3, &[0x00, 0x03])]),
        );
        mock.expect(
            &wire(commands::cmd_eeprom_read(eeprom::ADDR_NETWORK_TYPE, 1).unwrap()),
            &frames(&[(0xB3, &[0x00, 0x01])]),
        );

        let (module, _) = make_module(mock).await;
        assert_eq!(module.get_join_eui().await.unwrap(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(module.get_class().await.unwrap(), LoRaWanClass::C);
        assert!(module.get_adr().await.unwrap());
        assert_eq!(module.get_unconfirmed_repeat().await.unwrap(), 3);
        assert_eq!(module.get_network_type().await.unwrap(), NetworkType::Public);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eeprom_reader_failure() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_eeprom_read(eeprom::ADDR_CLASS, 1).unwrap()),
            &frames(&[(0xB3, &[0x01])]),
        );

        let (module, _) = make_module(mock).await;
        assert!(matches!(
            module.get_class().await.unwrap_err(),
            Error::Protocol(_)
        ));
    }

    // -----------------------------------------------------------------
    // Indications
    // -----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_get_indication_from_line_keeps_module_awake() {
        let mut mock = MockTransport::new();
        mock.push_incoming_after(Duration::from_millis(500), &frames(&[(0x41, &[0x00])]));

        let (module, probes) = make_module(mock).await;
        let parsed = module
            .get_parsed_indication(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(parsed, Some(Indication::Join { success: true }));
        assert_eq!(probes.wake.history(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_indication_timeout() {
        let (module, _) = make_module(MockTransport::new()).await;
        let result = module
            .get_indication(Duration::from_millis(100))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_indication_rejects_reply() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&frames(&[(0xB4, &[0x01, 0x02, 0x03, 0x04])]));

        let (module, _) = make_module(mock).await;
        let err = module
            .get_indication(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply(0xB4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_indication_zero_timeout() {
        let (module, _) = make_module(MockTransport::new()).await;
        let err = module.get_indication(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_join_skips_other_indications() {
        let mut mock = MockTransport::new();
        mock.push_incoming(&frames(&[(0x49, &[0x00, 0x01, 0x02])]));
        mock.push_incoming_after(Duration::from_secs(3), &frames(&[(0x41, &[0x01])]));

        let (module, _) = make_module(mock).await;
        let joined = module.wait_for_join(Duration::from_secs(10)).await.unwrap();
        assert_eq!(joined, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_join_times_out() {
        let (module, _) = make_module(MockTransport::new()).await;
        let start = Instant::now();
        let joined = module.wait_for_join(Duration::from_secs(5)).await.unwrap();
        assert_eq!(joined, None);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    // -----------------------------------------------------------------
    // WirelessModule primitives
    // -----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_transmit_and_receive_primitives() {
        let mut mock = MockTransport::new();
        mock.expect(
            &wire(commands::cmd_get_fw_version()),
            &frames(&[(0xB4, &[0x01, 0x00, 0x00, 0x00])]),
        );

        let (module, probes) = make_module(mock).await;
        module.transmit(&commands::cmd_get_fw_version()).await.unwrap();
        assert_eq!(probes.wake.level(), Some(false));

        let (frame, indication) = module
            .receive(Duration::from_millis(250), Some(0xB4))
            .await
            .unwrap();
        assert!(!indication);
        assert_eq!(frame.payload, vec![0x01, 0x00, 0x00, 0x00]);

        module.sleep().await.unwrap();
        assert!(probes.wake.is_high());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_rejects_zero_timeout() {
        let (module, _) = make_module(MockTransport::new()).await;
        let err = module.receive(Duration::ZERO, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_reset_pulse() {
        let (module, probes) = make_module(MockTransport::new()).await;
        let start = Instant::now();
        module.reset().await.unwrap();

        assert_eq!(probes.reset.history(), vec![false, true]);
        assert_eq!(
            start.elapsed(),
            Duration::from_millis(100) + Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_reset() {
        let mut mock = MockTransport::new();
        mock.expect(&[0xAA, 0x30, 0x00, 0x26], &[]);

        let (module, probes) = make_module(mock).await;
        let start = Instant::now();
        module.soft_reset().await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(probes.sent.len(), 1);
        assert!(probes.wake.is_high());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_pin_configuration_drives_idle() {
        let (module, probes) = make_module(MockTransport::new()).await;
        let wake = MockPin::new();
        let reset = MockPin::new();

        module
            .set_pin_configuration(PinConfiguration::new(wake.clone(), reset.clone()))
            .await
            .unwrap();
        assert_eq!(wake.history(), vec![true]);
        assert_eq!(reset.history(), vec![true]);

        module.wakeup().await.unwrap();
        assert_eq!(wake.level(), Some(false));
        assert!(probes.wake.history().is_empty());
    }

    #[tokio::test]
    async fn test_info() {
        let (module, _) = make_module(MockTransport::new()).await;
        assert_eq!(module.info().to_string(), "Mipot 32001353");
    }

    #[tokio::test]
    async fn test_close() {
        let (module, probes) = make_module(MockTransport::new()).await;
        module.close().await.unwrap();
        assert!(probes.wake.is_high());

        let err = module.get_fw_version().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
