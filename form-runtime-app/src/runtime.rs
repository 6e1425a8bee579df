//! Single-owner actor around a `FormController`

use form_runtime_core::error::{FormError, FormResult};
use form_runtime_core::types::{Answer, QueryCriteria, QuestionId};
use form_runtime_core::FormController;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce(&mut FormController) + Send>;

/// Operations sent to the form task
enum FormOp {
    Run(Job),
    Stop,
}

/// Owns the task running one form.
///
/// Every mutation happens on that task, in arrival order, so the controller's
/// single-threaded invariants hold no matter how many host threads hold a handle.
pub struct FormRuntime {
    handle: FormHandle,
    join_handle: JoinHandle<FormController>,
}

impl FormRuntime {
    /// Move `form` onto a new task. Must be called within a tokio runtime.
    pub fn start(form: FormController) -> Self {
        let name = form.info().name.clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<FormOp>();

        let join_handle = tokio::spawn(async move {
            let mut form = form;
            while let Some(op) = rx.recv().await {
                match op {
                    FormOp::Run(job) => job(&mut form),
                    FormOp::Stop => break,
                }
            }
            log::debug!("Form task for {} finished", form.info().name);
            form
        });
        log::info!("Form runtime for {name} started");

        Self {
            handle: FormHandle { tx, name },
            join_handle,
        }
    }

    /// A new handle onto the running form
    pub fn handle(&self) -> FormHandle {
        self.handle.clone()
    }

    /// Stop the task after the calls already queued and get the controller back.
    ///
    /// Calls sent through other handles afterwards fail with `Unavailable`.
    pub async fn shutdown(self) -> FormResult<FormController> {
        let name = self.handle.name.clone();
        // The task may already be gone; joining reports that.
        let _ = self.handle.tx.send(FormOp::Stop);
        let form = self
            .join_handle
            .await
            .map_err(|e| FormError::Unavailable(format!("form {name} task failed: {e}")))?;
        log::info!("Form runtime for {name} stopped");
        Ok(form)
    }
}

/// Cloneable, `Send` entry point for host calls
#[derive(Clone)]
pub struct FormHandle {
    tx: mpsc::UnboundedSender<FormOp>,
    name: String,
}

impl FormHandle {
    pub fn form_name(&self) -> &str {
        &self.name
    }

    /// Whether the form task still accepts calls
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Run `f` on the form task and wait for its result
    pub async fn call<T, F>(&self, f: F) -> FormResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FormController) -> FormResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |form: &mut FormController| {
            // The caller may have stopped waiting.
            let _ = tx.send(f(form));
        });
        self.tx
            .send(FormOp::Run(job))
            .map_err(|_| self.unavailable())?;
        rx.await.map_err(|_| self.unavailable())?
    }

    /// Read-only variant of [`call`](Self::call)
    pub async fn read<T, F>(&self, f: F) -> FormResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FormController) -> T + Send + 'static,
    {
        self.call(move |form| Ok(f(form))).await
    }

    pub async fn execute_query(&self, block: &str, criteria: QueryCriteria) -> FormResult<()> {
        let block = block.to_string();
        self.call(move |form| form.controller(&block)?.execute_query(criteria))
            .await
    }

    pub async fn save_changes(&self) -> FormResult<()> {
        self.call(FormController::save_changes).await
    }

    pub async fn answer(&self, question: QuestionId, answer: Answer) -> FormResult<()> {
        self.call(move |form| form.handle_answered_question(question, answer))
            .await
    }

    pub async fn execute_action_command(&self, block: Option<&str>, command: &str) -> FormResult<()> {
        let block = block.map(str::to_string);
        let command = command.to_string();
        self.call(move |form| form.execute_action_command(block.as_deref(), &command))
            .await
    }

    pub async fn open(&self) -> FormResult<()> {
        self.call(FormController::open).await
    }

    pub async fn close(&self) -> FormResult<()> {
        self.call(FormController::close).await
    }

    fn unavailable(&self) -> FormError {
        FormError::Unavailable(format!("form {} is not running", self.name))
    }
}
