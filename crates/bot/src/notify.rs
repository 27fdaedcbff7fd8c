//! Telling users how their deposits ended.

use std::sync::Arc;

use database::Deposit;
use ledger::{PollOutcome, SettledDeposit};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::render;
use crate::sender::MessageSender;

/// Message the depositor, and their referrer if one was paid.
pub async fn settled<S: MessageSender>(sender: &S, settled: &SettledDeposit) {
    if let Err(e) = sender
        .send_message(&settled.user_id, &render::settled(settled))
        .await
    {
        warn!(user_id = %settled.user_id, error = %e, "Could not send deposit confirmation");
    }

    if let Some(payout) = &settled.referral {
        let text = render::referral_paid(&settled.user_id, payout.bonus);
        if let Err(e) = sender.send_message(&payout.referrer_id, &text).await {
            warn!(referrer_id = %payout.referrer_id, error = %e, "Could not send referral notice");
        }
    }
}

/// Wait for a poller and report its outcome to the depositor.
pub fn watch_deposit<S: MessageSender + 'static>(
    sender: Arc<S>,
    deposit: Deposit,
    poller: JoinHandle<ledger::Result<PollOutcome>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = match poller.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(deposit_id = deposit.id, error = %e, "Deposit poller failed");
                return;
            }
            Err(e) => {
                error!(deposit_id = deposit.id, error = %e, "Deposit poller panicked");
                return;
            }
        };

        if let PollOutcome::Settled(done) = &outcome {
            settled(sender.as_ref(), done).await;
            return;
        }
        if let Some(text) = render::poll_outcome(&outcome, &deposit) {
            if let Err(e) = sender.send_message(&deposit.user_id, &text).await {
                warn!(deposit_id = deposit.id, error = %e, "Could not send deposit update");
            }
        }
    })
}
