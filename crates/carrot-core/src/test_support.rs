// Scripted `LightService` for engine and hub tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CoreError;
use crate::model::{DeviceId, Light, LightState};
use crate::service::LightService;

/// Replays queued poll results in order. Once the queue is empty the last
/// successful result repeats, like a cloud whose lights stopped changing.
#[derive(Default)]
pub(crate) struct ScriptedService {
    polls: Mutex<VecDeque<Result<Vec<Light>, CoreError>>>,
    last: Mutex<Vec<Light>>,
    panic_next: Mutex<bool>,
    failing_logins: AtomicUsize,
    poll_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_poll(&self, result: Result<Vec<Light>, CoreError>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub(crate) fn panic_next_poll(&self) {
        *self.panic_next.lock().unwrap() = true;
    }

    pub(crate) fn fail_logins(&self, count: usize) {
        self.failing_logins.store(count, Ordering::SeqCst);
    }

    pub(crate) fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

impl LightService for ScriptedService {
    async fn login(&self) -> Result<(), CoreError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_logins.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_logins.store(failing - 1, Ordering::SeqCst);
            return Err(CoreError::AuthenticationFailed {
                message: "scripted rejection".into(),
            });
        }
        Ok(())
    }

    async fn light_status(&self) -> Result<Vec<Light>, CoreError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let panic_now = std::mem::take(&mut *self.panic_next.lock().unwrap());
        assert!(!panic_now, "scripted poll panic");

        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(Ok(lights)) => {
                self.last.lock().unwrap().clone_from(&lights);
                Ok(lights)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn set_light(&self, _id: DeviceId, _state: LightState) -> Result<(), CoreError> {
        Ok(())
    }
}
