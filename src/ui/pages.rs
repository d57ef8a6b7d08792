/// Deck page layout
use super::components::{ErrorBanner, PlaybackControls, TapeReels, TrackLabel, VisualizerBars};
use super::theme::Theme;
use super::DeckView;
use crate::config::{ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_PLAYLIST_ID, ENV_REDIRECT_URI};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Wrap};

pub struct DemoBanner<'a> {
    pub theme: &'a Theme,
}

impl DemoBanner<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let paragraph = Paragraph::new("DEMO MODE - simulated tracks, no Spotify account needed")
            .alignment(Alignment::Center)
            .style(
                Style::default()
                    .fg(self.theme.background)
                    .bg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(paragraph, area);
    }
}

/// Shown in place of the controls until a session exists
pub struct SetupInstructions<'a> {
    pub theme: &'a Theme,
}

impl SetupInstructions<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let text = vec![
            Line::from("Setup"),
            Line::from(format!(
                "  1) Create a Spotify app and export {} and {}",
                ENV_CLIENT_ID, ENV_CLIENT_SECRET
            )),
            Line::from(format!(
                "  2) Register {} (or the default) as its redirect URI",
                ENV_REDIRECT_URI
            )),
            Line::from(format!("  3) Optionally set {} to start a mixtape", ENV_PLAYLIST_ID)),
            Line::from("  4) Press L to log in (Spotify Premium required)"),
        ];

        let paragraph = Paragraph::new(text)
            .style(Style::default().fg(self.theme.muted))
            .wrap(Wrap { trim: false })
            .block(Block::default().padding(Padding::horizontal(1)));
        f.render_widget(paragraph, area);
    }
}

/// The whole deck: cassette, bars, controls and message slot
pub struct DeckPage<'a> {
    pub view: &'a DeckView,
    pub theme: &'a Theme,
}

impl DeckPage<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let view = self.view;
        let theme = self.theme;

        let block = Block::default()
            .title(format!("Mixtape Player - {}", view.state.label()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.shell))
            .style(Style::default().fg(theme.foreground).bg(theme.background));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let message = view.error.as_deref().or(view.notice.as_deref());
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(if view.demo { 1 } else { 0 }),
                Constraint::Min(6),
                Constraint::Length(4),
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Length(if message.is_some() { 3 } else { 0 }),
                Constraint::Length(if view.authenticated { 0 } else { 6 }),
            ])
            .split(inner);

        if view.demo {
            DemoBanner { theme }.render(f, chunks[0]);
        }
        TapeReels {
            angle: view.reel_angle,
            intensity: view.intensity,
            theme,
        }
        .render(f, chunks[1]);
        TrackLabel {
            info: &view.track,
            theme,
        }
        .render(f, chunks[2]);
        VisualizerBars {
            intensity: view.intensity,
            theme,
        }
        .render(f, chunks[3]);
        PlaybackControls {
            playing: view.is_playing,
            authenticated: view.authenticated,
            tempo: view.tempo,
            theme,
        }
        .render(f, chunks[4]);

        match (&view.error, &view.notice) {
            (Some(error), _) => ErrorBanner {
                message: error,
                theme,
            }
            .render(f, chunks[5]),
            (None, Some(notice)) => {
                let paragraph = Paragraph::new(notice.as_str())
                    .style(Style::default().fg(theme.success))
                    .wrap(Wrap { trim: true })
                    .block(Block::default().borders(Borders::ALL));
                f.render_widget(paragraph, chunks[5]);
            }
            (None, None) => {}
        }

        if !view.authenticated {
            SetupInstructions { theme }.render(f, chunks[6]);
        }
    }
}
