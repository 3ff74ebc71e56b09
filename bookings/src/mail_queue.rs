//! Bounded mail queue with a single background consumer.
//!
//! Request handlers hand messages to [`MailQueue::enqueue`] and move on; one worker task
//! started by [`spawn_mail_worker`] delivers them in order. Delivery failures are logged and
//! counted by the worker and never reach the request that enqueued the message.
//!
//! When the queue is full the configured [`OverflowPolicy`] applies: `block` waits for a free
//! slot, `drop` discards the message.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{MailQueueConfig, OverflowPolicy},
    email::{MailData, MailSender},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnqueueError {
    /// Queue full under the `drop` policy; the message was discarded
    #[error("mail queue is full, message dropped")]
    Full,
    /// The worker has stopped
    #[error("mail queue is closed")]
    Closed,
}

#[derive(Clone, Debug)]
pub struct MailQueue {
    sender: mpsc::Sender<MailData>,
    overflow: OverflowPolicy,
}

impl MailQueue {
    /// Create the queue and the receiving end the worker consumes.
    pub fn new(config: &MailQueueConfig) -> (Self, mpsc::Receiver<MailData>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        (
            Self {
                sender,
                overflow: config.overflow,
            },
            receiver,
        )
    }

    pub async fn enqueue(&self, mail: MailData) -> Result<(), EnqueueError> {
        match self.overflow {
            OverflowPolicy::Block => self.sender.send(mail).await.map_err(|_| EnqueueError::Closed)?,
            OverflowPolicy::Drop => match self.sender.try_send(mail) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(dropped)) => {
                    warn!(subject = %dropped.subject, "Mail queue full, dropping message");
                    counter!("bookings_mail_dropped_total").increment(1);
                    return Err(EnqueueError::Full);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(EnqueueError::Closed),
            },
        }

        counter!("bookings_mail_enqueued_total").increment(1);
        Ok(())
    }
}

async fn deliver(mailer: &dyn MailSender, mail: MailData) {
    match mailer.send(&mail).await {
        Ok(()) => {
            debug!(subject = %mail.subject, "Mail delivered");
            counter!("bookings_mail_sent_total").increment(1);
        }
        Err(e) => {
            warn!(subject = %mail.subject, error = %e, "Mail delivery failed");
            counter!("bookings_mail_failed_total").increment(1);
        }
    }
}

/// Deliver queued mail until `shutdown` fires, then drain what is already buffered and exit.
pub async fn run_mail_worker(
    mut receiver: mpsc::Receiver<MailData>,
    mailer: Arc<dyn MailSender>,
    shutdown: CancellationToken,
) {
    info!("Starting mail worker");

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(mail) => deliver(mailer.as_ref(), mail).await,
                None => break,
            },
            _ = shutdown.cancelled() => {
                receiver.close();
                let mut drained = 0usize;
                while let Some(mail) = receiver.recv().await {
                    deliver(mailer.as_ref(), mail).await;
                    drained += 1;
                }
                info!(drained, "Mail worker drained queue on shutdown");
                break;
            }
        }
    }

    info!("Mail worker stopped");
}

pub fn spawn_mail_worker(
    receiver: mpsc::Receiver<MailData>,
    mailer: Arc<dyn MailSender>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_mail_worker(receiver, mailer, shutdown))
}
