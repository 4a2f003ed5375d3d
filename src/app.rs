//! Board screen state and key handling, kept apart from drawing so it can be
//! driven in tests without a terminal.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::error;

use crate::board::TaskBoard;
use crate::error::{StoreError, ValidationError};
use crate::store::TaskStore;
use crate::task::{Category, Priority, Task, TaskId, TaskInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    DueDate,
    Priority,
    Category,
    Tags,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        FormField::Title,
        FormField::Description,
        FormField::DueDate,
        FormField::Priority,
        FormField::Category,
        FormField::Tags,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::DueDate => "Due (YYYY-MM-DD)",
            FormField::Priority => "Priority",
            FormField::Category => "Category",
            FormField::Tags => "Tags",
        }
    }

    fn step(self, forward: bool) -> Self {
        let n = Self::ALL.len();
        let i = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        let next = if forward { (i + 1) % n } else { (i + n - 1) % n };
        Self::ALL[next]
    }
}

/// The add/edit form.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub editing: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: Priority,
    pub category: Option<Category>,
    pub tags: String,
    pub focus: FormField,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            editing: None,
            title: String::new(),
            description: String::new(),
            due_date: String::new(),
            priority: Priority::Medium,
            category: None,
            tags: String::new(),
            focus: FormField::Title,
        }
    }
}

impl TaskForm {
    pub fn edit(task: &Task) -> Self {
        Self {
            editing: Some(task.id),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            due_date: task
                .due_date
                .map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            priority: task.priority,
            category: task.category,
            tags: task.tags.join(", "),
            focus: FormField::Title,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::DueDate => Some(&mut self.due_date),
            FormField::Tags => Some(&mut self.tags),
            FormField::Priority | FormField::Category => None,
        }
    }

    fn cycle(&mut self, forward: bool) {
        match self.focus {
            FormField::Priority => {
                self.priority = if forward {
                    self.priority.next()
                } else {
                    self.priority.prev()
                }
            }
            FormField::Category => self.category = Category::cycle(self.category, forward),
            _ => {}
        }
    }

    /// Builds the draft. Dates are taken as the end of that local day.
    pub fn to_input(&self) -> Result<TaskInput, ValidationError> {
        Ok(TaskInput {
            title: self.title.clone(),
            description: Some(self.description.clone()),
            due_date: parse_due_date(&self.due_date, &Local)?,
            priority: self.priority,
            category: self.category,
            tags: self.tags.split(',').map(str::to_string).collect(),
        })
    }
}

/// Parses `YYYY-MM-DD` as 23:59:59 that day in `tz`. Blank means no date.
pub fn parse_due_date<Tz: TimeZone>(
    raw: &str,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = || ValidationError::InvalidDate(raw.to_string());
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    let end_of_day = date.and_hms_opt(23, 59, 59).ok_or_else(invalid)?;
    let local = tz
        .from_local_datetime(&end_of_day)
        .earliest()
        .ok_or_else(invalid)?;
    Ok(Some(local.with_timezone(&Utc)))
}

/// Where a hidden password prompt stands after one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEntry {
    Typing,
    Done,
    Cancelled,
}

/// Applies a key press to a secret typed with echo off.
pub fn edit_secret(secret: &mut String, key: KeyEvent) -> SecretEntry {
    if key.kind == KeyEventKind::Release {
        return SecretEntry::Typing;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            SecretEntry::Cancelled
        }
        KeyCode::Esc => SecretEntry::Cancelled,
        KeyCode::Enter => SecretEntry::Done,
        KeyCode::Backspace => {
            secret.pop();
            SecretEntry::Typing
        }
        KeyCode::Char(c) => {
            secret.push(c);
            SecretEntry::Typing
        }
        _ => SecretEntry::Typing,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Normal,
    Search,
    Form(TaskForm),
    ConfirmDelete(TaskId),
}

pub struct App<S> {
    pub board: TaskBoard<S>,
    pub mode: Mode,
    pub selected: usize,
    pub status: Option<String>,
    pub user_email: Option<String>,
    pub should_quit: bool,
}

impl<S: TaskStore> App<S> {
    pub fn new(board: TaskBoard<S>, user_email: Option<String>) -> Self {
        Self {
            board,
            mode: Mode::Normal,
            selected: 0,
            status: None,
            user_email,
            should_quit: false,
        }
    }

    pub fn reload(&mut self) {
        match self.board.load() {
            Ok(_) => self.clamp_selection(),
            Err(err) => self.report(&err, "load tasks"),
        }
    }

    /// The task under the cursor, in board display order.
    pub fn selected_task_id(&self) -> Option<TaskId> {
        self.board
            .groups()
            .iter()
            .nth(self.selected)
            .map(|(_, task)| task.id)
    }

    fn visible_len(&self) -> usize {
        self.board.groups().len()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn report(&mut self, err: &StoreError, action: &str) {
        error!(error = %err, action, "board action failed");
        self.status = Some(err.user_message(action));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.normal_key(key),
            Mode::Search => self.search_key(key),
            Mode::Form(form) => self.form_key(form, key),
            Mode::ConfirmDelete(id) => self.confirm_key(id, key),
        }
    }

    fn normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => {
                self.status = None;
                self.mode = Mode::Search;
            }
            KeyCode::Esc => {
                self.board.set_query("");
                self.clamp_selection();
            }
            KeyCode::Char('a') => self.mode = Mode::Form(TaskForm::default()),
            KeyCode::Char('e') => {
                let form = self
                    .selected_task_id()
                    .and_then(|id| self.board.find(id))
                    .map(TaskForm::edit);
                if let Some(form) = form {
                    self.mode = Mode::Form(form);
                }
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_task_id() {
                    match self.board.toggle_task(id) {
                        Ok(_) => self.status = None,
                        Err(err) => self.report(&err, "update task"),
                    }
                    self.clamp_selection();
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task_id() {
                    self.mode = Mode::ConfirmDelete(id);
                }
            }
            KeyCode::Char('r') => self.reload(),
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.visible_len() {
                    self.selected += 1;
                }
            }
            _ => {}
        }
    }

    fn search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => return,
            KeyCode::Char(c) => {
                let mut query = self.board.query().to_string();
                query.push(c);
                self.board.set_query(query);
            }
            KeyCode::Backspace => {
                let mut query = self.board.query().to_string();
                query.pop();
                self.board.set_query(query);
            }
            _ => {}
        }
        self.selected = 0;
        self.mode = Mode::Search;
    }

    fn form_key(&mut self, mut form: TaskForm, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Enter => {
                let result = form
                    .to_input()
                    .map_err(StoreError::from)
                    .and_then(|input| self.board.save_task(input, form.editing));
                match result {
                    Ok(_) => {
                        self.status = None;
                        self.clamp_selection();
                        return;
                    }
                    Err(err) => self.report(&err, "save task"),
                }
            }
            KeyCode::Tab | KeyCode::Down => form.focus = form.focus.step(true),
            KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.step(false),
            KeyCode::Left => form.cycle(false),
            KeyCode::Right => form.cycle(true),
            KeyCode::Backspace => {
                if let Some(text) = form.text_mut() {
                    text.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(text) = form.text_mut() {
                    text.push(c);
                } else if c == ' ' {
                    form.cycle(true);
                }
            }
            _ => {}
        }
        self.mode = Mode::Form(form);
    }

    fn confirm_key(&mut self, id: TaskId, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.board.delete_task(id) {
                    Ok(()) => self.status = None,
                    Err(err) => self.report(&err, "delete task"),
                }
                self.clamp_selection();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {}
            _ => self.mode = Mode::ConfirmDelete(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use crate::task::OwnerId;
    use chrono::{FixedOffset, Timelike};
    use tempfile::TempDir;

    fn app() -> (TempDir, App<JsonFileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let board = TaskBoard::new(
            JsonFileStore::in_dir(dir.path()),
            Some(OwnerId::new("alice")),
        );
        (dir, App::new(board, Some("alice@example.com".into())))
    }

    fn press(app: &mut App<JsonFileStore>, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App<JsonFileStore>, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn secret_entry_edits_without_echo() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        let mut secret = String::new();
        for c in "hunter2x".chars() {
            assert_eq!(edit_secret(&mut secret, key(KeyCode::Char(c))), SecretEntry::Typing);
        }
        edit_secret(&mut secret, key(KeyCode::Backspace));
        assert_eq!(edit_secret(&mut secret, key(KeyCode::Enter)), SecretEntry::Done);
        assert_eq!(secret, "hunter2");

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(edit_secret(&mut secret, ctrl_c), SecretEntry::Cancelled);
        assert_eq!(edit_secret(&mut secret, key(KeyCode::Esc)), SecretEntry::Cancelled);
        assert_eq!(secret, "hunter2");
    }

    #[test]
    fn due_date_parsing() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(parse_due_date("  ", &tz), Ok(None));
        let due = parse_due_date("2026-03-10", &tz).unwrap().unwrap();
        assert_eq!(due.with_timezone(&tz).date_naive().to_string(), "2026-03-10");
        assert_eq!(due.with_timezone(&tz).hour(), 23);
        assert_eq!(
            parse_due_date("10/03/2026", &tz),
            Err(ValidationError::InvalidDate("10/03/2026".into()))
        );
    }

    #[test]
    fn form_fields_cycle_and_wrap() {
        assert_eq!(FormField::Title.step(false), FormField::Tags);
        assert_eq!(FormField::Tags.step(true), FormField::Title);
    }

    #[test]
    fn add_task_through_the_form() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "Buy milk");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Normal);
        let task = &app.board.tasks()[0];
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description, None);
    }

    #[test]
    fn empty_title_keeps_the_form_open() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Form(_)));
        assert_eq!(app.status.as_deref(), Some("Please enter a task title"));
        assert!(app.board.tasks().is_empty());
    }

    #[test]
    fn search_filters_live_and_escape_clears() {
        let (_dir, mut app) = app();
        app.board.save_task(TaskInput::new("Buy milk"), None).unwrap();
        app.board.save_task(TaskInput::new("Walk dog"), None).unwrap();

        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "MIL");
        assert_eq!(app.board.visible_tasks().len(), 1);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.board.query(), "MIL");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.board.visible_tasks().len(), 2);
    }

    #[test]
    fn toggle_and_confirmed_delete() {
        let (_dir, mut app) = app();
        app.board.save_task(TaskInput::new("only"), None).unwrap();

        press(&mut app, KeyCode::Char(' '));
        assert!(app.board.tasks()[0].completed);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.board.tasks().len(), 1);

        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::ConfirmDelete(_)));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.board.tasks().is_empty());
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn edit_prefills_from_the_selected_task() {
        let (_dir, mut app) = app();
        let input = TaskInput {
            tags: vec!["home".into(), "weekly".into()],
            category: Some(Category::Family),
            ..TaskInput::new("Laundry")
        };
        app.board.save_task(input, None).unwrap();

        press(&mut app, KeyCode::Char('e'));
        let Mode::Form(form) = &app.mode else {
            panic!("expected form, got {:?}", app.mode);
        };
        assert_eq!(form.title, "Laundry");
        assert_eq!(form.tags, "home, weekly");
        assert_eq!(form.category, Some(Category::Family));
        assert!(form.editing.is_some());
    }

    #[test]
    fn selection_stays_in_range() {
        let (_dir, mut app) = app();
        app.board.save_task(TaskInput::new("a"), None).unwrap();
        app.board.save_task(TaskInput::new("b"), None).unwrap();
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, 1);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn q_quits() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('/'));
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}
