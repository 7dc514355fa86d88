use std::borrow::Cow;

use spawnd_model::ExitStatus;

use crate::error::TaskError;

/// Unit of work split across a process boundary.
///
/// ## Phases
/// 1. [`Task::init`] runs in the supervisor right before the fork.
/// 2. [`Task::run`] runs only in the child; its return value becomes the
///    child's exit code (the OS keeps the low 8 bits).
/// 3. [`Task::finish`] runs in the supervisor once the child has been reaped.
///
/// The child works on its own copy of the task taken at the fork instant.
/// Anything the supervisor mutates afterwards is invisible to `run`, and
/// anything `run` mutates never reaches the supervisor except through the exit
/// code or a [`crate::Messenger`].
pub trait Task {
    /// Human-readable name (for logs and events).
    fn name(&self) -> &str {
        "task"
    }

    fn init(&mut self) -> Result<(), TaskError> {
        Ok(())
    }

    fn run(&mut self) -> i32;

    fn finish(&mut self, status: ExitStatus) -> Result<(), TaskError> {
        let _ = status;
        Ok(())
    }
}

pub type TaskBox = Box<dyn Task>;

/// Adapter turning a zero-argument closure into a [`Task`] with no-op `init`/`finish`.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F>
where
    F: FnMut() -> i32,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> TaskFn<F>
where
    F: FnMut() -> i32 + 'static,
{
    /// Creates the task and boxes it in one step.
    pub fn boxed(name: impl Into<Cow<'static, str>>, f: F) -> TaskBox {
        Box::new(Self::new(name, f))
    }
}

impl<F> Task for TaskFn<F>
where
    F: FnMut() -> i32,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> i32 {
        (self.f)()
    }
}

/// Closure task carrying an owned context value.
///
/// The context is moved into the task at creation; the child reads its own copy.
pub struct ContextTask<C, F> {
    name: Cow<'static, str>,
    context: C,
    f: F,
}

impl<C, F> ContextTask<C, F>
where
    F: FnMut(&mut C) -> i32,
{
    pub fn new(name: impl Into<Cow<'static, str>>, context: C, f: F) -> Self {
        Self {
            name: name.into(),
            context,
            f,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<C, F> Task for ContextTask<C, F>
where
    F: FnMut(&mut C) -> i32,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> i32 {
        (self.f)(&mut self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_fn_runs_closure_and_keeps_name() {
        let mut task = TaskFn::new("seven", || 7);
        assert_eq!(task.name(), "seven");
        assert!(task.init().is_ok());
        assert_eq!(task.run(), 7);
        assert!(task.finish(ExitStatus::Exited(7)).is_ok());
    }

    #[test]
    fn boxed_task_is_object_safe() {
        let mut task: TaskBox = TaskFn::boxed(String::from("dyn"), || 3);
        assert_eq!(task.name(), "dyn");
        assert_eq!(task.run(), 3);
    }

    #[test]
    fn context_task_reads_and_mutates_its_context() {
        let mut task = ContextTask::new("ctx", vec![1, 2, 3], |ctx: &mut Vec<i32>| {
            ctx.push(4);
            ctx.iter().sum()
        });

        assert_eq!(task.run(), 10);
        assert_eq!(task.context(), &vec![1, 2, 3, 4]);
    }
}
