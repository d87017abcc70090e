//! Shared mock adapters for the core unit tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use kubevox_contracts::{
    failure::ExecutionFailure,
    invocation::{BoundArguments, ResultFields},
};

use crate::traits::Invoker;

/// An invoker that records every call and returns a scripted response.
pub(crate) struct MockInvoker {
    fields: &'static [&'static str],
    response: Result<ResultFields, ExecutionFailure>,
    delay: Option<Duration>,
    panics: bool,
    calls: AtomicUsize,
    last_arguments: Mutex<Option<BoundArguments>>,
}

impl MockInvoker {
    /// Succeeds with empty fields by default.
    pub(crate) fn new(fields: &'static [&'static str]) -> Self {
        Self {
            fields,
            response: Ok(ResultFields::new()),
            delay: None,
            panics: false,
            calls: AtomicUsize::new(0),
            last_arguments: Mutex::new(None),
        }
    }

    pub(crate) fn returning(mut self, fields: ResultFields) -> Self {
        self.response = Ok(fields);
        self
    }

    pub(crate) fn failing(mut self, failure: ExecutionFailure) -> Self {
        self.response = Err(failure);
        self
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_arguments(&self) -> Option<BoundArguments> {
        self.last_arguments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    fn result_fields(&self) -> &[&'static str] {
        self.fields
    }

    async fn invoke(&self, arguments: &BoundArguments) -> Result<ResultFields, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_arguments.lock().unwrap() = Some(arguments.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("adapter exploded");
        }
        self.response.clone()
    }
}

/// Build result fields from `(name, value)` pairs.
pub(crate) fn fields(pairs: &[(&str, serde_json::Value)]) -> ResultFields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
