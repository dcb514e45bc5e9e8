use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::error::{chain_error, parse_error, ConfirmError};
use super::poll::PollHandle;
use super::{ConfirmProps, SessionState};
use crate::chain::lcd::{ChainClient, CreateTxOptions, DEFAULT_ERROR_MESSAGE};
use crate::chain::networks::ChainOptions;
use crate::chain::types::{Coin, SignedTx, TxInfo, UnsignedTx};
use crate::chain::wallet::{AcquiredKey, Credentials, KeyProvider, SignMode, SignOptions, User};
use crate::fee::{select_fee_denom, FeeCalculator, FeeDenomRequest};
use crate::format::{self, FormatConfig, DEFAULT_DECIMALS};

pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.75;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const INSUFFICIENT_BALANCE: &str =
    "You don't have enough balance. Please adjust either the amount or the fee.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Multiplier applied to simulated gas
    pub gas_adjustment: f64,
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Entry of the fee denomination selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeDenomOption {
    pub denom: String,
    pub label: String,
    pub disabled: bool,
}

/// Final outcome shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmResult {
    Success { message: String },
    Failure { message: String },
}

/// One confirmation of one transaction intent
pub struct ConfirmSession {
    id: Uuid,
    props: ConfirmProps,
    user: User,
    chain: ChainOptions,
    client: Arc<dyn ChainClient>,
    keys: Arc<dyn KeyProvider>,
    calculator: Option<FeeCalculator>,
    settings: SessionSettings,

    state: SessionState,
    fee_denom: Option<String>,
    fee_input: String,
    estimated: Option<String>,
    gas: Option<u64>,
    unsigned_tx: Option<UnsignedTx>,
    password: Zeroizing<String>,
    password_error: Option<String>,
    device: Option<String>,
    error: Option<ConfirmError>,
    txhash: Option<String>,
    tx_info: Option<TxInfo>,
    poll: Option<PollHandle>,
}

impl ConfirmSession {
    pub fn new(
        props: ConfirmProps,
        user: User,
        chain: ChainOptions,
        client: Arc<dyn ChainClient>,
        keys: Arc<dyn KeyProvider>,
        settings: SessionSettings,
    ) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            props,
            user,
            chain,
            client,
            keys,
            calculator: None,
            settings,
            state: SessionState::Idle,
            fee_denom: None,
            fee_input: String::new(),
            estimated: None,
            gas: None,
            unsigned_tx: None,
            password: Zeroizing::new(String::new()),
            password_error: None,
            device: None,
            error: None,
            txhash: None,
            tx_info: None,
            poll: None,
        };
        session.clear();

        debug!(session = %session.id, address = %session.user.address, chain = %session.chain.chain_id, "confirm session created");
        session
    }

    /// Gas prices arrived; the session can simulate from now on
    pub fn set_fee_calculator(&mut self, calculator: FeeCalculator) {
        self.calculator = Some(calculator);
        if self.state == SessionState::Idle {
            self.fee_denom = self.pick_fee_denom(None);
        } else {
            self.update_fee();
        }
    }

    pub fn with_fee_calculator(mut self, calculator: FeeCalculator) -> Self {
        self.set_fee_calculator(calculator);
        self
    }

    /// Build the unsigned transaction and derive the default fee from its gas
    pub async fn simulate(&mut self) -> Result<(), ConfirmError> {
        self.expect_state(
            "simulate",
            &[SessionState::Idle, SessionState::Simulated, SessionState::Failed],
        )?;
        let calculator = self.calculator.clone().ok_or(ConfirmError::NotReady)?;

        self.error = None;
        self.unsigned_tx = None;
        self.gas = None;
        self.estimated = None;

        let denom = match self.pick_fee_denom(None) {
            Some(denom) => denom,
            None => return Err(self.fail(ConfirmError::NoFeeDenom)),
        };
        self.fee_denom = Some(denom.clone());
        self.transition(SessionState::Simulating);

        let options = CreateTxOptions {
            gas_price: calculator.gas_price(&denom),
            fee_denom: denom,
            gas_adjustment: self.settings.gas_adjustment,
            memo: self.props.memo.clone(),
        };

        match self.client.create_tx(&self.user.address, &self.props.msgs, &options).await {
            Ok(tx) => {
                let gas = tx.gas_limit();
                self.gas = Some(gas);
                self.unsigned_tx = Some(tx);

                if let Some(denom) = self.pick_fee_denom(Some(gas)) {
                    self.fee_denom = Some(denom);
                }
                self.update_fee();

                debug!(session = %self.id, gas, fee = ?self.estimated, "simulation done");
                self.transition(SessionState::Simulated);
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "simulation request failed");
                Err(self.fail(ConfirmError::Simulation(parse_error(&e, DEFAULT_ERROR_MESSAGE))))
            }
        }
    }

    /// Switch the fee denomination; the amount is recomputed from the known gas
    pub fn set_fee_denom(&mut self, denom: &str) -> Result<(), ConfirmError> {
        self.expect_state(
            "change the fee",
            &[SessionState::Simulated, SessionState::AwaitingPassword],
        )?;
        if !self.props.fee_denom.list.iter().any(|d| d == denom) {
            return Err(ConfirmError::InvalidFee);
        }

        self.fee_denom = Some(denom.to_string());
        self.update_fee();
        Ok(())
    }

    pub fn set_fee_input(&mut self, input: &str) -> Result<(), ConfirmError> {
        self.expect_state(
            "change the fee",
            &[SessionState::Simulated, SessionState::AwaitingPassword],
        )?;
        self.fee_input = input.trim().to_string();
        Ok(())
    }

    pub fn set_password(&mut self, password: &str) {
        self.password_error = None;
        self.password = Zeroizing::new(password.to_string());
    }

    /// Hardware device to sign with
    pub fn set_device(&mut self, device_id: &str) {
        self.device = Some(device_id.to_string());
    }

    /// Attach the fee, acquire the key, sign and broadcast. Returns the hash
    /// of the accepted transaction; the session is then polling.
    pub async fn submit(&mut self) -> Result<String, ConfirmError> {
        self.expect_state("submit", &[SessionState::Simulated])?;

        let fee = self.fee().ok_or(ConfirmError::NoFeeDenom)?;
        if !self.is_valid() {
            return Err(ConfirmError::InvalidFee);
        }
        if self.user.needs_password() && self.password.is_empty() {
            self.password_error = Some(ConfirmError::PasswordRequired.to_string());
            return Err(ConfirmError::PasswordRequired);
        }

        let mut tx = self.unsigned_tx.clone().ok_or(ConfirmError::NotReady)?;
        tx.set_fee(fee);
        self.error = None;

        self.transition(SessionState::AwaitingPassword);
        let key = match self.acquire_key().await {
            Ok(key) => key,
            Err(ConfirmError::IncorrectPassword) => {
                self.password.clear();
                self.password_error = Some(ConfirmError::IncorrectPassword.to_string());
                self.transition(SessionState::Simulated);
                return Err(ConfirmError::IncorrectPassword);
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(SessionState::Submitting);
        self.unsigned_tx = None;

        let signed = self.sign(&key, &tx).await;
        key.release().await;
        let signed = match signed {
            Ok(signed) => signed,
            Err(e) => return Err(self.fail(e)),
        };

        let result = match self.client.broadcast_sync(&signed).await {
            Ok(result) => result,
            Err(e) => {
                warn!(session = %self.id, error = %e, "broadcast request failed");
                return Err(self.fail(ConfirmError::Unknown(parse_error(&e, DEFAULT_ERROR_MESSAGE))));
            }
        };
        if result.code != 0 {
            return Err(self.fail(ConfirmError::Broadcast {
                code: result.code,
                raw_log: result.raw_log,
            }));
        }

        info!(session = %self.id, txhash = %result.txhash, "transaction broadcast");
        self.txhash = Some(result.txhash.clone());
        self.poll = Some(PollHandle::spawn(
            Arc::clone(&self.client),
            result.txhash.clone(),
            self.settings.poll_interval,
        ));
        self.transition(SessionState::Polling);

        Ok(result.txhash)
    }

    /// Wait for the polled transaction to be included and check its log
    pub async fn wait_for_result(&mut self) -> Result<TxInfo, ConfirmError> {
        self.expect_state("wait for the result", &[SessionState::Polling])?;

        let Some(mut poll) = self.poll.take() else {
            self.transition(SessionState::Cancelled);
            return Err(ConfirmError::Cancelled);
        };

        let info = match poll.wait().await {
            Ok(info) => info,
            Err(e) if e.is_cancelled() => {
                self.transition(SessionState::Cancelled);
                return Err(ConfirmError::Cancelled);
            }
            Err(e) => {
                warn!(session = %self.id, txhash = %poll.txhash(), error = %e, "transaction poll crashed");
                return Err(self.fail(ConfirmError::Unknown(DEFAULT_ERROR_MESSAGE.to_string())));
            }
        };
        self.tx_info = Some(info.clone());

        if let Some(message) = chain_error(&info, DEFAULT_ERROR_MESSAGE) {
            return Err(self.fail(ConfirmError::Chain(message)));
        }

        info!(session = %self.id, txhash = %info.txhash, height = info.height, "transaction succeeded");
        self.transition(SessionState::Succeeded);
        Ok(info)
    }

    /// Abandon the session. Signing and broadcasting cannot be interrupted.
    pub fn cancel(&mut self) -> Result<(), ConfirmError> {
        if self.state == SessionState::Submitting {
            return Err(ConfirmError::InvalidState {
                action: "cancel",
                state: self.state,
            });
        }

        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
        self.transition(SessionState::Cancelled);
        Ok(())
    }

    /// Discard simulation, fee, password and errors
    pub fn reset(&mut self) -> Result<(), ConfirmError> {
        if self.state == SessionState::Submitting {
            return Err(ConfirmError::InvalidState {
                action: "reset",
                state: self.state,
            });
        }

        self.clear();
        self.transition(SessionState::Idle);
        Ok(())
    }

    fn clear(&mut self) {
        self.poll = None;
        self.unsigned_tx = None;
        self.gas = None;
        self.estimated = None;
        self.error = None;
        self.txhash = None;
        self.tx_info = None;
        self.password = Zeroizing::new(String::new());
        self.password_error = None;
        self.fee_input = format::to_input("1");
        self.fee_denom = self.pick_fee_denom(None);
    }

    async fn acquire_key(&self) -> Result<AcquiredKey, ConfirmError> {
        let credentials = self.credentials()?;
        Ok(self.keys.get_key(&credentials).await?)
    }

    fn credentials(&self) -> Result<Credentials, ConfirmError> {
        if self.user.ledger {
            let device_id = self
                .device
                .clone()
                .ok_or_else(|| ConfirmError::KeyAcquisition("No hardware device selected".to_string()))?;
            return Ok(Credentials::hardware(device_id, self.user.path));
        }

        match &self.user.name {
            Some(name) => Ok(Credentials::Local {
                name: name.clone(),
                password: self.password.clone(),
            }),
            None => Err(ConfirmError::KeyAcquisition(format!(
                "No signing key for {}",
                self.user.address
            ))),
        }
    }

    async fn sign(&self, key: &AcquiredKey, tx: &UnsignedTx) -> Result<SignedTx, ConfirmError> {
        let account = self
            .client
            .account_info(&self.user.address)
            .await
            .map_err(|e| {
                warn!(session = %self.id, error = %e, "account lookup failed");
                ConfirmError::Unknown(parse_error(&e, DEFAULT_ERROR_MESSAGE))
            })?;

        let sign_mode = if key.requires_legacy_signing() {
            SignMode::LegacyAminoJson
        } else {
            SignMode::Direct
        };
        let options = SignOptions {
            account_number: account.account_number,
            sequence: account.sequence,
            chain_id: self.chain.chain_id.clone(),
            sign_mode,
            is_classic: self.chain.is_classic(),
        };

        debug!(session = %self.id, ?sign_mode, sequence = account.sequence, "signing");
        Ok(key.sign_tx(tx, &options).await?)
    }

    fn fee_request(&self, gas: Option<u64>) -> FeeDenomRequest<'_> {
        FeeDenomRequest {
            candidates: &self.props.fee_denom.list,
            balance: &self.props.balance,
            gas,
            calculator: self.calculator.as_ref(),
            validate: self.props.validate.as_ref(),
            default_denom: self.props.fee_denom.default_value.as_deref(),
            is_classic: self.chain.is_classic(),
        }
    }

    fn pick_fee_denom(&self, gas: Option<u64>) -> Option<String> {
        select_fee_denom(&self.fee_request(gas))
    }

    fn update_fee(&mut self) {
        let (Some(calculator), Some(gas), Some(denom)) = (&self.calculator, self.gas, &self.fee_denom) else {
            return;
        };

        let estimated = calculator.fee_from_gas(gas, denom);
        self.fee_input = format::to_input(estimated.as_deref().unwrap_or("0"));
        self.estimated = estimated;
    }

    fn expect_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), ConfirmError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ConfirmError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn fail(&mut self, error: ConfirmError) -> ConfirmError {
        warn!(session = %self.id, state = %self.state, error = %error, "confirmation failed");
        self.error = Some(error.clone());
        self.transition(SessionState::Failed);
        error
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn props(&self) -> &ConfirmProps {
        &self.props
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Fee as currently entered
    pub fn fee(&self) -> Option<Coin> {
        self.fee_denom
            .as_ref()
            .map(|denom| Coin::new(denom.clone(), format::to_amount(&self.fee_input)))
    }

    pub fn fee_denom(&self) -> Option<&str> {
        self.fee_denom.as_deref()
    }

    pub fn fee_input(&self) -> &str {
        &self.fee_input
    }

    pub fn estimated_fee(&self) -> Option<&str> {
        self.estimated.as_deref()
    }

    pub fn gas_limit(&self) -> Option<u64> {
        self.gas
    }

    pub fn unsigned_tx(&self) -> Option<&UnsignedTx> {
        self.unsigned_tx.as_ref()
    }

    pub fn txhash(&self) -> Option<&str> {
        self.txhash.as_deref()
    }

    pub fn tx_info(&self) -> Option<&TxInfo> {
        self.tx_info.as_ref()
    }

    pub fn error(&self) -> Option<&ConfirmError> {
        self.error.as_ref()
    }

    pub fn password_error(&self) -> Option<&str> {
        self.password_error.as_deref()
    }

    /// Lets another task stop the poll while this session waits on it
    pub fn poll_abort_handle(&self) -> Option<AbortHandle> {
        self.poll.as_ref().map(PollHandle::abort_handle)
    }

    /// Fee amount is positive and accepted by the caller's check
    pub fn is_valid(&self) -> bool {
        match self.fee() {
            Some(fee) => fee.amount_u128() > 0 && (self.props.validate)(&fee),
            None => false,
        }
    }

    pub fn can_submit(&self) -> bool {
        self.state == SessionState::Simulated
            && self.unsigned_tx.is_some()
            && self.is_valid()
            && (!self.user.needs_password() || !self.password.is_empty())
    }

    pub fn submit_label(&self) -> &str {
        match self.state {
            SessionState::AwaitingPassword | SessionState::Submitting => &self.props.submit_labels[1],
            _ => &self.props.submit_labels[0],
        }
    }

    pub fn fee_denom_options(&self) -> Vec<FeeDenomOption> {
        let request = self.fee_request(self.gas);
        self.props
            .fee_denom
            .list
            .iter()
            .map(|denom| FeeDenomOption {
                denom: denom.clone(),
                label: format::denom(denom, None),
                disabled: !(self.props.validate)(&request.fee_for(denom)),
            })
            .collect()
    }

    /// Hint shown when the entered fee is below the estimate
    pub fn fee_message(&self) -> Option<String> {
        let estimated = self.estimated.as_deref()?;
        let fee = self.fee()?;
        if fee.amount_u128() >= estimated.parse::<u128>().unwrap_or(0) {
            return None;
        }

        let recommended = format::coin(
            &Coin::new(fee.denom, estimated),
            DEFAULT_DECIMALS,
            FormatConfig::default(),
            None,
        );
        Some(format!(
            "Recommended fee is {} or higher.\nTransactions with low fee might fail to proceed.",
            recommended
        ))
    }

    pub fn form_errors(&self) -> Vec<String> {
        let mut errors = self.props.warning.clone();
        if self.state == SessionState::Simulated && !self.is_valid() {
            errors.push(INSUFFICIENT_BALANCE.to_string());
        }
        errors
    }

    pub fn result(&self) -> Option<ConfirmResult> {
        if let Some(error) = &self.error {
            return Some(ConfirmResult::Failure {
                message: error.to_string(),
            });
        }

        if self.state != SessionState::Succeeded {
            return None;
        }

        let parsed = match (&self.props.parse_result, &self.tx_info) {
            (Some(parse), Some(info)) => parse(info),
            _ => None,
        };
        Some(ConfirmResult::Success {
            message: parsed.unwrap_or_else(|| self.props.message.clone()),
        })
    }
}
