//! Interactive terminal client.
//!
//! A line-oriented stand-in for the task list page: it renders the visible
//! collection whenever the materializer replaces it, and maps commands onto
//! the composer, the record editor and the dispatcher.

use crate::error::SyncResult;
use crate::sync::dispatcher::DELETE_PROMPT;
use crate::sync::{
    EditState, Navigation, RecordEditor, RemoveOutcome, SessionController, SessionState,
    SyncContext, TaskComposer,
};
use crate::types::TaskRecord;
use anyhow::Result;
use std::collections::BTreeSet;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const HELP: &str = "\
Commands:
  signup <email> <password>   create an account and sign in
  login <email> <password>    sign in
  logout                      sign out
  add <text>                  add a task
  list                        show tasks
  edit <n|id>                 edit a task
  text <text>                 replace the edit buffer
  save                        save the edit
  cancel                      leave edit mode
  rm <n|id>                   delete a task (asks for confirmation)
  quit                        exit";

/// Render the task list with edit and pending-delete markers.
pub fn render_board(
    records: &[TaskRecord],
    editor: &RecordEditor,
    pending: &BTreeSet<String>,
) -> String {
    if records.is_empty() {
        return "No tasks yet.".to_string();
    }

    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        let line = match editor.state() {
            EditState::Editing { record_id, buffer } if record_id == &record.id => {
                format!("> {}. [editing] {}", index + 1, buffer)
            }
            _ if pending.contains(&record.id) => {
                format!("  {}. {} (deleting...)", index + 1, record.text)
            }
            _ => format!("  {}. {}", index + 1, record.text),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out.pop();
    out
}

/// Find a record by 1-based position or by id.
fn resolve<'a>(records: &'a [TaskRecord], arg: &str) -> Option<&'a TaskRecord> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => records.get(n - 1),
        _ => records.iter().find(|r| r.id == arg),
    }
}

fn report<T>(result: SyncResult<T>) {
    if let Err(e) = result {
        println!("{}", e);
    }
}

struct Shell {
    session: SessionController,
    editor: RecordEditor,
    composer: TaskComposer,
    /// Record awaiting a y/N answer.
    confirming: Option<String>,
    removals: mpsc::UnboundedSender<(String, SyncResult<RemoveOutcome>)>,
}

impl Shell {
    fn records(&self) -> Vec<TaskRecord> {
        self.session.materializer().visible().to_vec()
    }

    fn print_board(&self) {
        let records = self.records();
        let pending = self.session.dispatcher().pending();
        println!("{}", render_board(&records, &self.editor, &pending));
    }

    /// Returns `false` to exit.
    async fn handle_line(&mut self, line: &str) -> bool {
        if let Some(record_id) = self.confirming.take() {
            let confirmed = matches!(line.trim(), "y" | "Y" | "yes");
            self.spawn_remove(record_id, confirmed);
            return true;
        }

        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "help" | "?" => println!("{}", HELP),
            "quit" | "exit" => return false,
            "signup" | "login" => {
                let Some((email, password)) = rest.split_once(' ') else {
                    println!("usage: {} <email> <password>", command);
                    return true;
                };
                let gate = self.session.gate();
                let result = if command == "signup" {
                    gate.sign_up(email, password.trim()).await
                } else {
                    gate.sign_in(email, password.trim()).await
                };
                match result {
                    Ok(identity) => println!("Signed in as {}", identity.email),
                    Err(e) => println!("{}", e),
                }
            }
            "logout" => {
                if let Err(e) = self.session.sign_out().await {
                    println!("{}", e);
                }
            }
            "add" => {
                self.composer.set(rest);
                let identity = self.session.identity();
                let dispatcher = self.session.dispatcher();
                report(self.composer.submit(dispatcher, identity.as_ref()).await);
            }
            "list" | "ls" => self.print_board(),
            "edit" => match resolve(&self.records(), rest) {
                Some(record) => {
                    self.editor.start_edit(record);
                    self.print_board();
                }
                None => println!("No such task: {}", rest),
            },
            "text" => {
                if !self.editor.set_buffer(rest) {
                    println!("Not editing. Use `edit <n>` first.");
                }
            }
            "save" => {
                let dispatcher = self.session.dispatcher();
                report(self.editor.save(dispatcher).await);
            }
            "cancel" => {
                self.editor.cancel();
                self.print_board();
            }
            "rm" => match resolve(&self.records(), rest) {
                Some(record) if self.session.dispatcher().is_pending(&record.id) => {
                    println!("Already deleting.");
                }
                Some(record) => {
                    println!("{} [y/N]", DELETE_PROMPT);
                    self.confirming = Some(record.id.clone());
                }
                None => println!("No such task: {}", rest),
            },
            other => println!("Unknown command: {}. Type `help`.", other),
        }
        true
    }

    fn spawn_remove(&self, record_id: String, confirmed: bool) {
        let dispatcher = std::sync::Arc::clone(self.session.dispatcher());
        let removals = self.removals.clone();
        tokio::spawn(async move {
            let result = dispatcher.remove(&record_id, move |_| confirmed).await;
            let _ = removals.send((record_id, result));
        });
    }

    fn on_collection_replaced(&mut self) {
        let records = self.records();
        if self.editor.reconcile(&records) {
            println!("The task you were editing was removed.");
        }
        self.print_board();
    }

    fn on_navigation(&mut self, nav: Navigation) {
        match nav {
            Navigation::SignIn => {
                self.editor.cancel();
                self.confirming = None;
                println!(
                    "Signed out. Use `login <email> <password>` or `signup <email> <password>`."
                );
            }
        }
    }
}

/// Run the shell until `quit` or end of input.
pub async fn run(ctx: SyncContext) -> Result<()> {
    let session = SessionController::start(&ctx);
    let mut visible = session.materializer().watch();
    let mut navigation = session.subscribe_navigation();
    let (removals_tx, mut removals) = mpsc::unbounded_channel();

    match session.state() {
        SessionState::Authenticated(identity) => println!("Signed in as {}", identity.email),
        _ => println!("Not signed in. Type `help` for commands."),
    }

    let mut shell = Shell {
        session,
        editor: RecordEditor::new(),
        composer: TaskComposer::new(),
        confirming: None,
        removals: removals_tx,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !shell.handle_line(&line).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            changed = visible.changed() => {
                if changed.is_err() {
                    break;
                }
                shell.on_collection_replaced();
            }
            nav = navigation.recv() => {
                match nav {
                    Ok(nav) => shell.on_navigation(nav),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Navigation receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            Some((record_id, result)) = removals.recv() => {
                match result {
                    Ok(RemoveOutcome::Declined) => println!("Kept."),
                    Ok(RemoveOutcome::AlreadyPending) => println!("Already deleting."),
                    Ok(RemoveOutcome::Removed) => debug!(id = %record_id, "Remove acknowledged"),
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    shell.session.teardown();
    Ok(())
}
