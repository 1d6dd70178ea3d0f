//! Key bytes to viewer commands.

const fn ctrl(key: u8) -> u8 {
    key - 96
}

pub const ESCAPE: u8 = 27;
pub const DELETE: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ReloadDocument,
    SetAnchor,
    SetDefaultZoom,
    ShowStatus,
    CancelCount,
    BeginSetMark,
    Sleep,
    Digit(u8),
    NextPage,
    PrevPage,
    /// `G`: jump relative to the page count and the anchor.
    GotoPage,
    /// `O`: jump by the anchor difference.
    RelativeJump,
    Zoom,
    FitWidth,
    FitContentWidth,
    FitHeight,
    Rotate,
    BeginJumpMark { exact_row: bool },
    ScrollDown,
    ScrollUp,
    ScrollRight,
    ScrollLeft,
    PageTop,
    PageBottom,
    PageMiddle,
    CenterColumn,
    ScreenDown,
    ScreenUp,
    PageLeftEdge,
    PageRightEdge,
    ContentLeftEdge,
    ContentRightEdge,
    Repaint,
    Unknown(u8),
}

impl Command {
    pub fn from_key(key: u8) -> Self {
        match key {
            b'q' => Command::Quit,
            k if k == ctrl(b'c') => Command::Quit,
            b'e' => Command::ReloadDocument,
            b'o' => Command::SetAnchor,
            b'Z' => Command::SetDefaultZoom,
            b'i' => Command::ShowStatus,
            ESCAPE => Command::CancelCount,
            b'm' => Command::BeginSetMark,
            b'd' => Command::Sleep,
            b'0'..=b'9' => Command::Digit(key - b'0'),
            b'J' => Command::NextPage,
            k if k == ctrl(b'f') => Command::NextPage,
            b'K' => Command::PrevPage,
            k if k == ctrl(b'b') => Command::PrevPage,
            b'G' => Command::GotoPage,
            b'O' => Command::RelativeJump,
            b'z' => Command::Zoom,
            b'w' => Command::FitWidth,
            b'W' => Command::FitContentWidth,
            b'f' => Command::FitHeight,
            b'r' => Command::Rotate,
            b'\'' => Command::BeginJumpMark { exact_row: false },
            b'`' => Command::BeginJumpMark { exact_row: true },
            b'j' => Command::ScrollDown,
            b'k' => Command::ScrollUp,
            b'l' => Command::ScrollRight,
            b'h' => Command::ScrollLeft,
            b'H' => Command::PageTop,
            b'L' => Command::PageBottom,
            b'M' => Command::PageMiddle,
            b'C' => Command::CenterColumn,
            b' ' => Command::ScreenDown,
            k if k == ctrl(b'd') => Command::ScreenDown,
            DELETE => Command::ScreenUp,
            k if k == ctrl(b'u') => Command::ScreenUp,
            b'[' => Command::PageLeftEdge,
            b']' => Command::PageRightEdge,
            b'{' => Command::ContentLeftEdge,
            b'}' => Command::ContentRightEdge,
            k if k == ctrl(b'l') => Command::Repaint,
            other => Command::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_keys_map_to_paging() {
        assert_eq!(Command::from_key(6), Command::NextPage);
        assert_eq!(Command::from_key(2), Command::PrevPage);
        assert_eq!(Command::from_key(4), Command::ScreenDown);
        assert_eq!(Command::from_key(21), Command::ScreenUp);
        assert_eq!(Command::from_key(12), Command::Repaint);
        assert_eq!(Command::from_key(3), Command::Quit);
    }

    #[test]
    fn digits_carry_their_value() {
        assert_eq!(Command::from_key(b'0'), Command::Digit(0));
        assert_eq!(Command::from_key(b'7'), Command::Digit(7));
    }

    #[test]
    fn quote_keys_choose_row_mode() {
        assert_eq!(
            Command::from_key(b'`'),
            Command::BeginJumpMark { exact_row: true }
        );
        assert_eq!(
            Command::from_key(b'\''),
            Command::BeginJumpMark { exact_row: false }
        );
    }

    #[test]
    fn unmapped_keys_are_unknown() {
        assert_eq!(Command::from_key(b'x'), Command::Unknown(b'x'));
        assert_eq!(Command::from_key(0), Command::Unknown(0));
    }
}
