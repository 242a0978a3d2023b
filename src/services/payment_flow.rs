use crate::{
    clients::order_api::{OrderApi, RepayOutcome},
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    models::order::{OrderStatus, PaymentStatus},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// State of a bank-transfer payment session. Everything but
/// `AwaitingPayment` is terminal and absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentSessionState {
    AwaitingPayment,
    Paid,
    ExpiredCancelled,
    ExternallyCancelled,
}

impl PaymentSessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentSessionState::AwaitingPayment)
    }
}

/// The two event sources feeding the session: order polls and the local
/// countdown reaching zero.
#[derive(Clone, Copy, Debug)]
pub enum PaymentSignal {
    Poll {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },
    CountdownExpired,
}

/// What the driver must do after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentAction {
    Continue,
    StopPolling,
    /// Fire the cancel request for the order. Returned at most once per
    /// session.
    IssueCancel,
}

/// The pure transition core of the payment state machine. Both timers feed
/// this single `apply` function; no other code mutates the session.
#[derive(Clone, Debug)]
pub struct PaymentSession {
    order_id: Uuid,
    amount: Decimal,
    state: PaymentSessionState,
    last_status: Option<OrderStatus>,
    cancel_issued: bool,
}

impl PaymentSession {
    pub fn new(order_id: Uuid, amount: Decimal) -> Self {
        Self {
            order_id,
            amount,
            state: PaymentSessionState::AwaitingPayment,
            last_status: None,
            cancel_issued: false,
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn state(&self) -> PaymentSessionState {
        self.state
    }

    /// Applies one signal. Signals arriving after a terminal state never
    /// change it.
    pub fn apply(&mut self, signal: PaymentSignal) -> PaymentAction {
        if self.state.is_terminal() {
            return PaymentAction::Continue;
        }

        match signal {
            PaymentSignal::Poll {
                status,
                payment_status,
            } => {
                self.last_status = Some(status);
                if payment_status == PaymentStatus::Paid {
                    self.state = PaymentSessionState::Paid;
                    PaymentAction::StopPolling
                } else if status == OrderStatus::Cancelled {
                    self.state = PaymentSessionState::ExternallyCancelled;
                    PaymentAction::StopPolling
                } else {
                    PaymentAction::Continue
                }
            }
            PaymentSignal::CountdownExpired => {
                // The session ends now either way; the cancel request fires
                // at most once, and not when a poll already saw the order
                // cancelled through another channel.
                let issue_cancel =
                    !self.cancel_issued && self.last_status != Some(OrderStatus::Cancelled);
                self.cancel_issued = true;
                self.state = PaymentSessionState::ExpiredCancelled;
                if issue_cancel {
                    PaymentAction::IssueCancel
                } else {
                    PaymentAction::StopPolling
                }
            }
        }
    }
}

/// Client-visible projection of a running session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProgress {
    pub state: PaymentSessionState,
    pub remaining_secs: u64,
}

/// A spawned payment session: progress receiver plus the join handle.
pub struct PaymentSessionHandle {
    pub progress: watch::Receiver<PaymentProgress>,
    task: JoinHandle<Result<PaymentSessionState, ServiceError>>,
}

impl PaymentSessionHandle {
    /// Stops the session without waiting for a terminal state, e.g. when
    /// the shopper navigates away. The server-side deadline, if any,
    /// remains authoritative.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub async fn join(self) -> Result<PaymentSessionState, ServiceError> {
        self.task
            .await
            .map_err(|e| ServiceError::InternalError(format!("Payment session task failed: {}", e)))?
    }
}

/// Drives bank-transfer payment sessions against the order service.
///
/// One `select!` loop joins the poll interval and the countdown deadline
/// and feeds both into `PaymentSession::apply`. The loop exits on any
/// terminal state, so a poll loop can never outlive its session.
#[derive(Clone)]
pub struct PaymentFlowService {
    orders: Arc<dyn OrderApi>,
    events: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl PaymentFlowService {
    pub fn new(orders: Arc<dyn OrderApi>, events: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        Self {
            orders,
            events,
            config,
        }
    }

    /// Runs a session to its terminal state. The countdown anchors to this
    /// call, not to order creation: re-opening the session view restarts
    /// the advisory window while the server deadline stays authoritative.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn await_payment(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<PaymentSessionState, ServiceError> {
        let (progress, _keepalive) = watch::channel(PaymentProgress {
            state: PaymentSessionState::AwaitingPayment,
            remaining_secs: self.config.payment.window_secs,
        });
        self.drive(order_id, amount, progress).await
    }

    /// Spawns a session and hands back its progress surface.
    pub fn open_session(&self, order_id: Uuid, amount: Decimal) -> PaymentSessionHandle {
        let (tx, rx) = watch::channel(PaymentProgress {
            state: PaymentSessionState::AwaitingPayment,
            remaining_secs: self.config.payment.window_secs,
        });
        let service = self.clone();
        let task = tokio::spawn(async move { service.drive(order_id, amount, tx).await });
        PaymentSessionHandle { progress: rx, task }
    }

    /// Requests a fresh payment attempt for a still-pending order. The
    /// order service treats re-pay on a terminal order as a safe no-op;
    /// callers check `Order::is_awaiting_payment` for the informational
    /// path but must not rely on it.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn repay(&self, order_id: Uuid) -> Result<RepayOutcome, ServiceError> {
        let outcome = self.orders.repay_order(order_id).await?;
        if let RepayOutcome::BankTransfer(ref instructions) = outcome {
            info!(
                order_id = %order_id,
                amount = %instructions.amount,
                "Re-payment opened a new bank-transfer window"
            );
        }
        Ok(outcome)
    }

    async fn drive(
        &self,
        order_id: Uuid,
        amount: Decimal,
        progress: watch::Sender<PaymentProgress>,
    ) -> Result<PaymentSessionState, ServiceError> {
        let window = Duration::from_secs(self.config.payment.window_secs);
        let poll_every = Duration::from_secs(self.config.payment.poll_interval_secs);
        let max_failures = self.config.payment.max_consecutive_poll_failures;

        let mut session = PaymentSession::new(order_id, amount);
        self.events
            .send_or_log(Event::PaymentSessionOpened { order_id, amount })
            .await;

        let opened = tokio::time::Instant::now();
        let deadline = opened + window;
        // First poll lands one interval after opening, not immediately.
        let mut poll = tokio::time::interval_at(opened + poll_every, poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let countdown = tokio::time::sleep_until(deadline);
        tokio::pin!(countdown);

        let mut consecutive_failures: u32 = 0;

        loop {
            let action = tokio::select! {
                _ = &mut countdown, if !session.state().is_terminal() => {
                    session.apply(PaymentSignal::CountdownExpired)
                }
                _ = poll.tick() => {
                    match self.orders.get_order(order_id).await {
                        Ok(order) => {
                            consecutive_failures = 0;
                            session.apply(PaymentSignal::Poll {
                                status: order.status,
                                payment_status: order.payment_status,
                            })
                        }
                        Err(error) => {
                            consecutive_failures += 1;
                            warn!(
                                %error,
                                consecutive_failures,
                                "Order poll failed"
                            );
                            if consecutive_failures >= max_failures {
                                return Err(error);
                            }
                            PaymentAction::Continue
                        }
                    }
                }
            };

            if action == PaymentAction::IssueCancel {
                // A failed cancel must not strand the session; the server
                // deadline, if enforced, is authoritative anyway.
                if let Err(error) = self.orders.cancel_order(order_id).await {
                    warn!(%error, "Timeout cancel request failed, abandoning session");
                }
            }

            let remaining = deadline
                .saturating_duration_since(tokio::time::Instant::now())
                .as_secs();
            let _ = progress.send(PaymentProgress {
                state: session.state(),
                remaining_secs: remaining,
            });

            if session.state().is_terminal() {
                match session.state() {
                    PaymentSessionState::Paid => {
                        self.events.send_or_log(Event::PaymentConfirmed(order_id)).await;
                        info!(order_id = %order_id, "Payment confirmed");
                    }
                    PaymentSessionState::ExpiredCancelled => {
                        self.events
                            .send_or_log(Event::PaymentSessionExpired(order_id))
                            .await;
                        info!(order_id = %order_id, "Payment window expired, order cancelled");
                    }
                    PaymentSessionState::ExternallyCancelled => {
                        self.events.send_or_log(Event::OrderCancelled(order_id)).await;
                        info!(order_id = %order_id, "Order cancelled through another channel");
                    }
                    PaymentSessionState::AwaitingPayment => unreachable!("terminal check"),
                }
                return Ok(session.state());
            }
        }
    }
}
