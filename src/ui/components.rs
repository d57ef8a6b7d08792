/// Reusable deck widgets
use super::theme::Theme;
use super::{bar_height, reel_scale};
use crate::models::TrackInfo;
use ratatui::prelude::*;
use ratatui::symbols;
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine};
use ratatui::widgets::{Block, Borders, Paragraph, Sparkline, Wrap};
use std::f64::consts::TAU;

/// Resting heights of the visualizer bars
pub const BAR_BASE: [u64; 16] = [3, 5, 7, 4, 6, 8, 5, 3, 4, 7, 6, 5, 8, 4, 6, 3];

const REEL_RADIUS: f64 = 11.0;
const HUB_RADIUS: f64 = 3.5;
const SPOKES: usize = 3;

pub struct TapeReels<'a> {
    pub angle: f64,
    pub intensity: f32,
    pub theme: &'a Theme,
}

impl TapeReels<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let radius = REEL_RADIUS * reel_scale(self.intensity);
        let angle = self.angle;
        let reel = self.theme.reel;
        let shell = self.theme.shell;

        let canvas = Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(shell)),
            )
            .marker(symbols::Marker::Braille)
            .x_bounds([0.0, 100.0])
            .y_bounds([0.0, 40.0])
            .paint(move |ctx| {
                for cx in [28.0, 72.0] {
                    let cy = 20.0;
                    ctx.draw(&Circle {
                        x: cx,
                        y: cy,
                        radius,
                        color: reel,
                    });
                    ctx.draw(&Circle {
                        x: cx,
                        y: cy,
                        radius: HUB_RADIUS,
                        color: reel,
                    });
                    for spoke in 0..SPOKES {
                        let a = angle + spoke as f64 * TAU / SPOKES as f64;
                        ctx.draw(&CanvasLine {
                            x1: cx + HUB_RADIUS * a.cos(),
                            y1: cy + HUB_RADIUS * a.sin(),
                            x2: cx + (radius - 1.0) * a.cos(),
                            y2: cy + (radius - 1.0) * a.sin(),
                            color: reel,
                        });
                    }
                }
                // Tape running between the reels
                ctx.draw(&CanvasLine {
                    x1: 28.0,
                    y1: 20.0 - radius,
                    x2: 72.0,
                    y2: 20.0 - radius,
                    color: shell,
                });
            });

        f.render_widget(canvas, area);
    }
}

/// Cassette label with the current title and artist
pub struct TrackLabel<'a> {
    pub info: &'a TrackInfo,
    pub theme: &'a Theme,
}

impl TrackLabel<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let text = vec![
            Line::from(Span::styled(
                self.info.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(self.info.artist.clone()),
        ];

        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(self.theme.background).bg(self.theme.label))
            .block(Block::default().borders(Borders::ALL));

        f.render_widget(paragraph, area);
    }
}

pub struct VisualizerBars<'a> {
    pub intensity: f32,
    pub theme: &'a Theme,
}

impl VisualizerBars<'_> {
    pub fn heights(&self) -> Vec<u64> {
        BAR_BASE
            .iter()
            .map(|base| bar_height(*base, self.intensity))
            .collect()
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let data = self.heights();
        let max = BAR_BASE.iter().max().copied().unwrap_or(1) * 2;
        let sparkline = Sparkline::default()
            .data(&data)
            .max(max)
            .style(Style::default().fg(self.theme.accent));

        f.render_widget(sparkline, area);
    }
}

pub struct PlaybackControls<'a> {
    pub playing: bool,
    pub authenticated: bool,
    pub tempo: Option<u32>,
    pub theme: &'a Theme,
}

impl PlaybackControls<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let play_status = if self.playing { "⏸ Pause" } else { "▶ Play" };
        let tempo = self
            .tempo
            .map(|bpm| format!("  ~{} BPM", bpm))
            .unwrap_or_default();
        let session_key = if self.authenticated {
            "O: Logout"
        } else {
            "L: Login"
        };

        let text = vec![
            Line::from(format!("⏮ Prev | {} | Next ⏭{}", play_status, tempo)),
            Line::from(Span::styled(
                format!(
                    "Space: Play/Pause | N: Next | P: Previous | {} | Q: Quit",
                    session_key
                ),
                Style::default().fg(self.theme.muted),
            )),
        ];

        let paragraph = Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(self.theme.foreground))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(paragraph, area);
    }
}

pub struct ErrorBanner<'a> {
    pub message: &'a str,
    pub theme: &'a Theme,
}

impl ErrorBanner<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let paragraph = Paragraph::new(self.message.to_string())
            .style(Style::default().fg(self.theme.error))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("Error")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.theme.error)),
            );

        f.render_widget(paragraph, area);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::Terminal;

    pub(crate) fn buffer_text(buffer: &Buffer) -> String {
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn draw<F>(width: u16, height: u16, render: F) -> String
    where
        F: FnOnce(&mut Frame, Rect),
    {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| {
                let area = f.size();
                render(f, area)
            })
            .unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn test_label_shows_title_and_artist() {
        let theme = Theme::vintage();
        let info = TrackInfo {
            title: "Synthwave Dreams".to_string(),
            artist: "80s Nostalgia".to_string(),
        };
        let text = draw(40, 4, |f, area| {
            TrackLabel {
                info: &info,
                theme: &theme,
            }
            .render(f, area)
        });
        assert!(text.contains("Synthwave Dreams"));
        assert!(text.contains("80s Nostalgia"));
    }

    #[test]
    fn test_controls_reflect_play_state_and_session() {
        let theme = Theme::dark();
        let text = draw(80, 3, |f, area| {
            PlaybackControls {
                playing: true,
                authenticated: true,
                tempo: Some(128),
                theme: &theme,
            }
            .render(f, area)
        });
        assert!(text.contains("Pause"));
        assert!(text.contains("~128 BPM"));
        assert!(text.contains("O: Logout"));

        let text = draw(80, 3, |f, area| {
            PlaybackControls {
                playing: false,
                authenticated: false,
                tempo: None,
                theme: &theme,
            }
            .render(f, area)
        });
        assert!(text.contains("Play"));
        assert!(text.contains("L: Login"));
    }

    #[test]
    fn test_error_banner_shows_message() {
        let theme = Theme::light();
        let text = draw(60, 3, |f, area| {
            ErrorBanner {
                message: "Failed to toggle playback",
                theme: &theme,
            }
            .render(f, area)
        });
        assert!(text.contains("Error"));
        assert!(text.contains("Failed to toggle playback"));
    }

    #[test]
    fn test_bars_grow_with_intensity() {
        let theme = Theme::vintage();
        let idle = VisualizerBars {
            intensity: 0.0,
            theme: &theme,
        };
        let loud = VisualizerBars {
            intensity: 1.0,
            theme: &theme,
        };
        assert_eq!(idle.heights(), BAR_BASE.to_vec());
        assert!(idle
            .heights()
            .iter()
            .zip(loud.heights())
            .all(|(a, b)| b == a * 2));
    }

    #[test]
    fn test_reels_draw_something() {
        let theme = Theme::vintage();
        let text = draw(40, 12, |f, area| {
            TapeReels {
                angle: 0.3,
                intensity: 0.5,
                theme: &theme,
            }
            .render(f, area)
        });
        assert!(text.chars().any(|c| ('\u{2801}'..='\u{28ff}').contains(&c)));
    }
}
