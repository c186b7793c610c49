/// State management module
///
/// This module handles all application state, including:
/// - Transform options and their observers (options.rs)
/// - The queue of files waiting for conversion (uploads.rs)
/// - Per-operation task slots with supersession (tasks.rs)
/// - The session controller tying the above together (session.rs)

pub mod options;
pub mod uploads;
pub mod tasks;
pub mod session;
