//! The DOM contract: element ids the widget binds to and the controls they
//! represent.

/// Commands sent by the fixed-command buttons.
pub const FIXED_COMMANDS: [&str; 5] = ["dusk", "dawn", "noon", "midnight", "save"];

/// Command sent by the hard-reset button after confirmation.
pub const HARD_RESET_COMMAND: &str = "hardReset";

/// Typed command that clears the log shortly after submission.
pub const CLEAR_COMMAND: &str = "clear";

/// Every element id the widget reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementId {
    CommandStatus,
    CommandLine,
    Console,
    ConsoleModal,
    Dusk,
    Dawn,
    Noon,
    Midnight,
    HardReset,
    SaveWorld,
    ConsoleButton,
    Close,
    Submit,
    ClearConsole,
}

impl ElementId {
    pub const ALL: [Self; 14] = [
        Self::CommandStatus,
        Self::CommandLine,
        Self::Console,
        Self::ConsoleModal,
        Self::Dusk,
        Self::Dawn,
        Self::Noon,
        Self::Midnight,
        Self::HardReset,
        Self::SaveWorld,
        Self::ConsoleButton,
        Self::Close,
        Self::Submit,
        Self::ClearConsole,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommandStatus => "command-status",
            Self::CommandLine => "command-line",
            Self::Console => "console",
            Self::ConsoleModal => "console-modal",
            Self::Dusk => "dusk",
            Self::Dawn => "dawn",
            Self::Noon => "noon",
            Self::Midnight => "midnight",
            Self::HardReset => "hard-reset",
            Self::SaveWorld => "save-world",
            Self::ConsoleButton => "console-button",
            Self::Close => "close",
            Self::Submit => "submit",
            Self::ClearConsole => "clear-console",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|element| element.as_str() == id)
    }

    /// The clickable control behind this element, if it is one.
    #[must_use]
    pub const fn control(self) -> Option<Control> {
        match self {
            Self::Dusk => Some(Control::Fixed("dusk")),
            Self::Dawn => Some(Control::Fixed("dawn")),
            Self::Noon => Some(Control::Fixed("noon")),
            Self::Midnight => Some(Control::Fixed("midnight")),
            Self::SaveWorld => Some(Control::Fixed("save")),
            Self::HardReset => Some(Control::HardReset),
            Self::ConsoleButton => Some(Control::OpenModal),
            Self::Close => Some(Control::CloseModal),
            Self::Submit => Some(Control::Submit),
            Self::ClearConsole => Some(Control::ClearConsole),
            Self::CommandStatus | Self::CommandLine | Self::Console | Self::ConsoleModal => None,
        }
    }
}

/// A clickable affordance of the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Submits its literal command without confirmation.
    Fixed(&'static str),
    /// Destructive reboot; confirmation required.
    HardReset,
    OpenModal,
    CloseModal,
    /// Submits the text currently typed in `command-line`.
    Submit,
    ClearConsole,
}

impl Control {
    /// Controls the web shell attaches click listeners to, with their element.
    #[must_use]
    pub fn clickable() -> impl Iterator<Item = (ElementId, Self)> {
        ElementId::ALL
            .into_iter()
            .filter_map(|element| element.control().map(|control| (element, control)))
    }
}
