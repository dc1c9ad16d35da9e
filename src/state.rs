use std::collections::VecDeque;

use crate::aggregate::BOARD_SIZE;
use crate::resolve::{DisplayEntry, pad_to_board};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone)]
pub struct AppState {
    /// Always exactly `BOARD_SIZE` rows, placeholders included.
    pub board: Vec<DisplayEntry>,
    /// A poll cycle is in flight.
    pub loading: bool,
    /// At least one cycle has produced a board.
    pub has_data: bool,
    /// Generation of the board currently shown; 0 before the first one.
    pub generation: u64,
    pub last_updated: Option<String>,
    pub cached_images: usize,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            board: pad_to_board(Vec::new(), BOARD_SIZE),
            loading: true,
            has_data: false,
            generation: 0,
            last_updated: None,
            cached_images: 0,
            logs: VecDeque::with_capacity(MAX_LOGS),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// The loading indicator replaces the board until the first cycle lands.
    pub fn show_loading(&self) -> bool {
        self.loading && !self.has_data
    }

    pub fn podium(&self) -> &[DisplayEntry] {
        &self.board[..3.min(self.board.len())]
    }

    pub fn others(&self) -> &[DisplayEntry] {
        &self.board[3.min(self.board.len())..]
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    CycleStarted {
        generation: u64,
    },
    SetBoard {
        generation: u64,
        entries: Vec<DisplayEntry>,
        cached_images: usize,
    },
    FetchFailed {
        generation: u64,
        error: String,
    },
    Log(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    RefreshNow,
    ClearImageCache,
    Shutdown,
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::CycleStarted { generation } => {
            if generation > state.generation {
                state.loading = true;
            }
        }
        Delta::SetBoard {
            generation,
            entries,
            cached_images,
        } => {
            // A board from an older cycle must not overwrite a newer one.
            if generation <= state.generation {
                state.push_log(format!(
                    "[INFO] Dropped stale board #{generation} (showing #{})",
                    state.generation
                ));
                return;
            }
            let mut entries = entries;
            entries.truncate(BOARD_SIZE);
            state.board = pad_to_board(entries, BOARD_SIZE);
            state.generation = generation;
            state.cached_images = cached_images;
            state.has_data = true;
            state.loading = false;
            state.last_updated = Some(chrono::Local::now().format("%H:%M:%S").to_string());
        }
        Delta::FetchFailed { generation, error } => {
            state.loading = false;
            state.push_log(format!("[WARN] Poll #{generation} failed: {error}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

/// French plural rule: 0 and 1 take the singular.
pub fn vote_label(votes: u32) -> String {
    if votes > 1 {
        format!("{votes} votes")
    } else {
        format!("{votes} vote")
    }
}
