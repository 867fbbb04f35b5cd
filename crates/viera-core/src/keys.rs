//! Remote control key codes sent with `X_SendKey`.

use std::fmt;
use std::str::FromStr;

macro_rules! keys {
    ($($variant:ident => $name:literal, $code:literal;)+) => {
        /// A button on the TV remote.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Key {
            $($variant,)+
        }

        impl Key {
            /// Every known key, in declaration order.
            pub const ALL: &'static [Key] = &[$(Key::$variant,)+];

            /// Wire code, e.g. `NRC_POWER-ONOFF`.
            pub fn code(self) -> &'static str {
                match self {
                    $(Key::$variant => $code,)+
                }
            }

            /// Human name accepted by [`FromStr`], e.g. `power`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Key::$variant => $name,)+
                }
            }
        }
    };
}

keys! {
    ThirtySecondSkip => "thirty_second_skip", "NRC_30S_SKIP-ONOFF";
    Toggle3d => "toggle_3d", "NRC_3D-ONOFF";
    Apps => "apps", "NRC_APPS-ONOFF";
    Aspect => "aspect", "NRC_ASPECT-ONOFF";
    Blue => "blue", "NRC_BLUE-ONOFF";
    Cancel => "cancel", "NRC_CANCEL-ONOFF";
    ClosedCaptions => "cc", "NRC_CC-ONOFF";
    ChatMode => "chat_mode", "NRC_CHAT_MODE-ONOFF";
    ChannelDown => "ch_down", "NRC_CH_DOWN-ONOFF";
    Input => "input_key", "NRC_CHG_INPUT-ONOFF";
    Network => "network", "NRC_CHG_NETWORK-ONOFF";
    ChannelUp => "ch_up", "NRC_CH_UP-ONOFF";
    Num0 => "num_0", "NRC_D0-ONOFF";
    Num1 => "num_1", "NRC_D1-ONOFF";
    Num2 => "num_2", "NRC_D2-ONOFF";
    Num3 => "num_3", "NRC_D3-ONOFF";
    Num4 => "num_4", "NRC_D4-ONOFF";
    Num5 => "num_5", "NRC_D5-ONOFF";
    Num6 => "num_6", "NRC_D6-ONOFF";
    Num7 => "num_7", "NRC_D7-ONOFF";
    Num8 => "num_8", "NRC_D8-ONOFF";
    Num9 => "num_9", "NRC_D9-ONOFF";
    DigaControl => "diga_control", "NRC_DIGA_CTL-ONOFF";
    Display => "display", "NRC_DISP_MODE-ONOFF";
    Down => "down", "NRC_DOWN-ONOFF";
    Enter => "enter", "NRC_ENTER-ONOFF";
    Epg => "epg", "NRC_EPG-ONOFF";
    EzSync => "ez_sync", "NRC_EZ_SYNC-ONOFF";
    Favorite => "favorite", "NRC_FAVORITE-ONOFF";
    FastForward => "fast_forward", "NRC_FF-ONOFF";
    Game => "game", "NRC_GAME-ONOFF";
    Green => "green", "NRC_GREEN-ONOFF";
    Guide => "guide", "NRC_GUIDE-ONOFF";
    Hold => "hold", "NRC_HOLD-ONOFF";
    Home => "home", "NRC_HOME-ONOFF";
    Index => "index", "NRC_INDEX-ONOFF";
    Info => "info", "NRC_INFO-ONOFF";
    Connect => "connect", "NRC_INTERNET-ONOFF";
    Left => "left", "NRC_LEFT-ONOFF";
    Menu => "menu", "NRC_MENU-ONOFF";
    Mpx => "mpx", "NRC_MPX-ONOFF";
    Mute => "mute", "NRC_MUTE-ONOFF";
    NetBs => "net_bs", "NRC_NET_BS-ONOFF";
    NetCs => "net_cs", "NRC_NET_CS-ONOFF";
    NetTd => "net_td", "NRC_NET_TD-ONOFF";
    OffTimer => "off_timer", "NRC_OFFTIMER-ONOFF";
    Pause => "pause", "NRC_PAUSE-ONOFF";
    PictAi => "pictai", "NRC_PICTAI-ONOFF";
    Play => "play", "NRC_PLAY-ONOFF";
    PictureNoiseReduction => "p_nr", "NRC_P_NR-ONOFF";
    Power => "power", "NRC_POWER-ONOFF";
    Program => "program", "NRC_PROG-ONOFF";
    Record => "record", "NRC_REC-ONOFF";
    Red => "red", "NRC_RED-ONOFF";
    Return => "return_key", "NRC_RETURN-ONOFF";
    Rewind => "rewind", "NRC_REW-ONOFF";
    Right => "right", "NRC_RIGHT-ONOFF";
    RScreen => "r_screen", "NRC_R_SCREEN-ONOFF";
    LastView => "last_view", "NRC_R_TUNE-ONOFF";
    Sap => "sap", "NRC_SAP-ONOFF";
    ToggleSdCard => "toggle_sd_card", "NRC_SD_CARD-ONOFF";
    SkipNext => "skip_next", "NRC_SKIP_NEXT-ONOFF";
    SkipPrev => "skip_prev", "NRC_SKIP_PREV-ONOFF";
    Split => "split", "NRC_SPLIT-ONOFF";
    Stop => "stop", "NRC_STOP-ONOFF";
    Subtitles => "subtitles", "NRC_STTL-ONOFF";
    Submenu => "option", "NRC_SUBMENU-ONOFF";
    Surround => "surround", "NRC_SURROUND-ONOFF";
    Swap => "swap", "NRC_SWAP-ONOFF";
    Text => "text", "NRC_TEXT-ONOFF";
    Tv => "tv", "NRC_TV-ONOFF";
    Up => "up", "NRC_UP-ONOFF";
    Link => "link", "NRC_VIERA_LINK-ONOFF";
    VolumeDown => "volume_down", "NRC_VOLDOWN-ONOFF";
    VolumeUp => "volume_up", "NRC_VOLUP-ONOFF";
    VTools => "vtools", "NRC_VTOOLS-ONOFF";
    Yellow => "yellow", "NRC_YELLOW-ONOFF";
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown key name or code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key: {}", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for Key {
    type Err = UnknownKey;

    /// Accepts either the human name (`volume_up`) or the wire code (`NRC_VOLUP-ONOFF`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Key::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(trimmed) || key.code() == trimmed)
            .ok_or_else(|| UnknownKey(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_names() {
        assert_eq!("power".parse::<Key>(), Ok(Key::Power));
        assert_eq!("volume_up".parse::<Key>(), Ok(Key::VolumeUp));
        assert_eq!("NUM_5".parse::<Key>(), Ok(Key::Num5));
    }

    #[test]
    fn parses_wire_codes() {
        assert_eq!("NRC_MUTE-ONOFF".parse::<Key>(), Ok(Key::Mute));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "launch_rockets".parse::<Key>().unwrap_err();
        assert_eq!(err.to_string(), "unknown key: launch_rockets");
    }

    #[test]
    fn display_is_wire_code() {
        assert_eq!(Key::Power.to_string(), "NRC_POWER-ONOFF");
        assert_eq!(Key::ThirtySecondSkip.to_string(), "NRC_30S_SKIP-ONOFF");
    }

    #[test]
    fn names_and_codes_are_unique() {
        let mut names: Vec<_> = Key::ALL.iter().map(|k| k.name()).collect();
        let mut codes: Vec<_> = Key::ALL.iter().map(|k| k.code()).collect();
        names.sort_unstable();
        names.dedup();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(names.len(), Key::ALL.len());
        assert_eq!(codes.len(), Key::ALL.len());
    }
}
