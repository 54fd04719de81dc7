// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tracing::info;

use crate::action::Action;
use crate::prompts;
use crate::session::{HistoryEntry, Session};

/// Entered once at session start: build the welcome message.
///
/// A form with no required fields has nothing to collect, so it completes
/// immediately instead of greeting the user into an empty conversation.
pub(crate) fn run(session: &mut Session) {
    if session.required_fields.is_empty() {
        let text = format!(
            "The **{}** form has no required fields — it's already complete!",
            session.form.title
        );
        info!("form has no required fields, completing on greeting");
        session.history.push(HistoryEntry::assistant(text.clone()));
        session.action = Some(Action::FormComplete {
            data: session.answers_json(),
            message: Some(text),
        });
        return;
    }

    let text = prompts::greeting(&session.form);
    session.history.push(HistoryEntry::assistant(text.clone()));
    session.action = Some(Action::message(text));
}
