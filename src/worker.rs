//! Serialized execution for materializer operations.
//!
//! Every materializer operation is a read-modify-write cycle against
//! the day store; two cycles interleaved on the same day race and can
//! silently drop one side's write. A single spawned task owns the
//! [`DayMaterializer`] and applies commands in arrival order; the
//! cloneable [`MaterializerHandle`] is the async facade in front of it.
//!
//! The evaluator needs none of this — it is pure and runs anywhere.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use daybook_core::{ActivityTemplate, DateRange, Day, DayActivity, DaybookError, DaybookResult};

use crate::feed::ChangeBatch;
use crate::materializer::DayMaterializer;

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<DaybookResult<T>>;

enum Command {
    PrepareDays {
        templates: Vec<ActivityTemplate>,
        range: DateRange,
        reply: Reply<Vec<Day>>,
    },
    ExtendFutureOccurrences {
        template: Box<ActivityTemplate>,
        from: NaiveDate,
        reply: Reply<()>,
    },
    InsertUserOccurrence {
        occurrence: Box<DayActivity>,
        date: NaiveDate,
        reply: Reply<()>,
    },
    RemoveOccurrence {
        occurrence: Box<DayActivity>,
        date: NaiveDate,
        reply: Reply<()>,
    },
    ReconcileUpdatedTemplate {
        template: Box<ActivityTemplate>,
        from: NaiveDate,
        reply: Reply<()>,
    },
    ReconcileRemovedTemplate {
        template: Box<ActivityTemplate>,
        from: NaiveDate,
        reply: Reply<()>,
    },
    ReplaceOccurrence {
        occurrence: Box<DayActivity>,
        date: NaiveDate,
        reply: Reply<()>,
    },
    MoveOccurrence {
        occurrence: Box<DayActivity>,
        to_date: NaiveDate,
        reply: Reply<()>,
    },
    CopyOccurrence {
        occurrence: Box<DayActivity>,
        dates: Vec<NaiveDate>,
        reply: Reply<()>,
    },
    ApplyChangeBatch {
        batch: ChangeBatch,
        reply: Reply<BTreeSet<NaiveDate>>,
    },
}

/// Async facade over the worker task. Cheap to clone; all clones feed
/// the same serialized loop.
#[derive(Clone)]
pub struct MaterializerHandle {
    tx: mpsc::Sender<Command>,
}

impl MaterializerHandle {
    /// Spawn the worker task and return its handle. The task exits
    /// once every handle is dropped.
    pub fn spawn(materializer: DayMaterializer) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(worker_loop(materializer, rx));
        MaterializerHandle { tx }
    }

    pub async fn prepare_days(
        &self,
        templates: Vec<ActivityTemplate>,
        range: DateRange,
    ) -> DaybookResult<Vec<Day>> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::PrepareDays {
                templates,
                range,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn extend_future_occurrences(
        &self,
        template: ActivityTemplate,
        from: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::ExtendFutureOccurrences {
                template: Box::new(template),
                from,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn insert_user_occurrence(
        &self,
        occurrence: DayActivity,
        date: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::InsertUserOccurrence {
                occurrence: Box::new(occurrence),
                date,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn remove_occurrence(
        &self,
        occurrence: DayActivity,
        date: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::RemoveOccurrence {
                occurrence: Box::new(occurrence),
                date,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn reconcile_updated_template(
        &self,
        template: ActivityTemplate,
        from: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::ReconcileUpdatedTemplate {
                template: Box::new(template),
                from,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn reconcile_removed_template(
        &self,
        template: ActivityTemplate,
        from: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::ReconcileRemovedTemplate {
                template: Box::new(template),
                from,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn replace_occurrence(
        &self,
        occurrence: DayActivity,
        date: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::ReplaceOccurrence {
                occurrence: Box::new(occurrence),
                date,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn move_occurrence(
        &self,
        occurrence: DayActivity,
        to_date: NaiveDate,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::MoveOccurrence {
                occurrence: Box::new(occurrence),
                to_date,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn copy_occurrence(
        &self,
        occurrence: DayActivity,
        dates: Vec<NaiveDate>,
    ) -> DaybookResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            Command::CopyOccurrence {
                occurrence: Box::new(occurrence),
                dates,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn apply_change_batch(
        &self,
        batch: ChangeBatch,
    ) -> DaybookResult<BTreeSet<NaiveDate>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyChangeBatch { batch, reply }, rx)
            .await
    }

    async fn send<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<DaybookResult<T>>,
    ) -> DaybookResult<T> {
        self.tx.send(command).await.map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())?
    }
}

fn worker_gone() -> DaybookError {
    DaybookError::Store("materializer worker is gone".into())
}

async fn worker_loop(materializer: DayMaterializer, mut rx: mpsc::Receiver<Command>) {
    debug!("materializer worker started");
    // Replies to callers that gave up waiting are dropped on the floor
    while let Some(command) = rx.recv().await {
        match command {
            Command::PrepareDays {
                templates,
                range,
                reply,
            } => {
                let _ = reply.send(materializer.prepare_days(&templates, range).await);
            }
            Command::ExtendFutureOccurrences {
                template,
                from,
                reply,
            } => {
                let _ = reply.send(
                    materializer
                        .extend_future_occurrences(&template, from)
                        .await,
                );
            }
            Command::InsertUserOccurrence {
                occurrence,
                date,
                reply,
            } => {
                let _ = reply.send(materializer.insert_user_occurrence(*occurrence, date).await);
            }
            Command::RemoveOccurrence {
                occurrence,
                date,
                reply,
            } => {
                let _ = reply.send(materializer.remove_occurrence(&occurrence, date).await);
            }
            Command::ReconcileUpdatedTemplate {
                template,
                from,
                reply,
            } => {
                let _ = reply.send(
                    materializer
                        .reconcile_updated_template(&template, from)
                        .await,
                );
            }
            Command::ReconcileRemovedTemplate {
                template,
                from,
                reply,
            } => {
                let _ = reply.send(
                    materializer
                        .reconcile_removed_template(&template, from)
                        .await,
                );
            }
            Command::ReplaceOccurrence {
                occurrence,
                date,
                reply,
            } => {
                let _ = reply.send(materializer.replace_occurrence(*occurrence, date).await);
            }
            Command::MoveOccurrence {
                occurrence,
                to_date,
                reply,
            } => {
                let _ = reply.send(materializer.move_occurrence(&occurrence, to_date).await);
            }
            Command::CopyOccurrence {
                occurrence,
                dates,
                reply,
            } => {
                let _ = reply.send(materializer.copy_occurrence(&occurrence, &dates).await);
            }
            Command::ApplyChangeBatch { batch, reply } => {
                let _ = reply.send(materializer.apply_change_batch(&batch).await);
            }
        }
    }
    debug!("materializer worker stopped");
}
