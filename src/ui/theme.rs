//! cliclack theme

use cliclack::ThemeState;
use console::Style;

/// Blue accents, green on submit
#[derive(Debug, Clone, Default)]
pub struct ArtcacheTheme;

impl cliclack::Theme for ArtcacheTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().blue().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue().bold(),
            ThemeState::Error(_) => Style::new().red().bold(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green(),
        }
    }
}

/// Install the theme for all prompts
pub fn init_theme() {
    cliclack::set_theme(ArtcacheTheme);
}
