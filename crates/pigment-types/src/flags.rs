//! Action flags declared by a history function at construction time.

use bitflags::bitflags;

bitflags! {
    /// What a history function promises about its own execution.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ActionFlags: u8 {
        /// No special behavior.
        const NONE = 0b0000;
        /// The active tool stays active while the function runs. The engine
        /// only carries this flag; honoring it is up to the host.
        const KEEP_TOOL_ACTIVE = 0b0001;
        /// The function polls for cancellation and may stop early.
        const CANCELLABLE = 0b0010;
        /// The function reports progress while it runs.
        const REPORTS_PROGRESS = 0b0100;
    }
}

impl ActionFlags {
    #[must_use]
    pub fn keeps_tool_active(self) -> bool {
        self.contains(Self::KEEP_TOOL_ACTIVE)
    }

    #[must_use]
    pub fn is_cancellable(self) -> bool {
        self.contains(Self::CANCELLABLE)
    }

    #[must_use]
    pub fn reports_progress(self) -> bool {
        self.contains(Self::REPORTS_PROGRESS)
    }
}
