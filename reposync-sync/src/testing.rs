//! Scripted [`Executor`] double for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::SyncError;
use crate::executor::{CommandResult, CommandSpec, Executor};

enum Reply {
    Exit(i32, String),
    Error(SyncError),
}

/// Replays canned replies in order and records every command it sees.
///
/// Running out of replies fails the command with `ExecutableNotFound`, so an
/// unexpected extra call shows up as an error instead of a panic.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    replies: RefCell<VecDeque<Reply>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ok(self, output: &str) -> Self {
        self.exit(0, output)
    }

    pub(crate) fn exit(self, code: i32, output: &str) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Reply::Exit(code, output.to_string()));
        self
    }

    pub(crate) fn error(self, err: SyncError) -> Self {
        self.replies.borrow_mut().push_back(Reply::Error(err));
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Each call as `program arg1 arg2 …`.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::display).collect()
    }
}

impl Executor for ScriptedExecutor {
    fn output(&self, spec: &CommandSpec) -> Result<CommandResult, SyncError> {
        self.calls.borrow_mut().push(spec.clone());
        match self.replies.borrow_mut().pop_front() {
            Some(Reply::Exit(code, output)) => Ok(CommandResult {
                command: spec.display(),
                code: Some(code),
                success: code == 0,
                output,
            }),
            Some(Reply::Error(err)) => Err(err),
            None => Err(SyncError::ExecutableNotFound {
                program: format!("unscripted: {}", spec.display()),
            }),
        }
    }
}
