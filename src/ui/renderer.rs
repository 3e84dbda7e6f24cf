/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Compose the next frame into `front` (a grid of Cells)
///   2. Compare each cell with `back` (the previous frame)
///   3. Emit terminal commands only for cells that changed, batched with
///      `queue!` and flushed once
///   4. Swap front/back
///
/// Composing is pure: `compose()` reads GameState and Content and writes a
/// FrameBuffer, nothing else. The renderer never mutates game state.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::content::Content;
use crate::domain::score::Standing;
use crate::sim::scheduler::Millis;
use crate::sim::state::{ChaosStage, GameState, Phase, DARES_PER_ROUND};

// ── Palette ──

const BASE_BG: Color = Color::Rgb { r: 28, g: 16, b: 30 };
const PINK: Color = Color::Rgb { r: 255, g: 110, b: 180 };
const ROSE: Color = Color::Rgb { r: 255, g: 170, b: 200 };
const GOLD: Color = Color::Rgb { r: 255, g: 210, b: 80 };
const GOOD: Color = Color::Rgb { r: 90, g: 230, b: 120 };
const BAD: Color = Color::Rgb { r: 255, g: 70, b: 70 };
const TERM_GREEN: Color = Color::Rgb { r: 120, g: 255, b: 140 };
const DIM: Color = Color::Rgb { r: 130, g: 110, b: 130 };
const PANEL: Color = Color::Rgb { r: 50, g: 30, b: 55 };

/// Label of the runaway button; the shell keeps it fully on screen.
pub const NO_BUTTON: &str = "[ No ]";
const YES_BUTTON: &str = "[ Yes ]";

const CARD_W: usize = 60;
const BOARD_ROW: usize = 1;
const CARD_ROW: usize = 7;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: BASE_BG };

    /// Differs from any real cell, so every position gets diffed.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = if bg == Color::Reset { BASE_BG } else { bg };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

pub struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    pub fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write `s` at (x, y), one column per char, clipped at the right edge.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let x = center_x(s.chars().count(), self.width);
        self.put_str(x, y, s, fg, bg);
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, bg: Color) {
        for row in y..y + h {
            for col in x..x + w {
                self.set(col, row, Cell::new(' ', Color::White, bg));
            }
        }
    }

    #[cfg(test)]
    fn row_text(&self, y: usize) -> String {
        (0..self.width).map(|x| self.get(x, y).ch).collect()
    }
}

fn center_x(len: usize, width: usize) -> usize {
    width.saturating_sub(len) / 2
}

/// Greedy word wrap. A word longer than `width` gets a line of its own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Cheap deterministic noise for glitch effects.
fn noise(seed: u64) -> u64 {
    let mut x = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 29;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^ (x >> 32)
}

/// Area the "No" button may dodge into on a `w` x `h` terminal.
pub fn no_button_area(w: u16, h: u16) -> (u16, u16) {
    let label = NO_BUTTON.chars().count() as u16;
    (w.saturating_sub(label).max(1), h.saturating_sub(1).max(1))
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn size(&self) -> (u16, u16) {
        (self.term_w as u16, self.term_h as u16)
    }

    pub fn render(&mut self, state: &GameState, content: &Content, now: Millis) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
        }

        if self.last_phase != Some(state.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(state.phase);
        }

        compose(&mut self.front, state, content, now);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = BASE_BG;
        let mut need_move = true;
        let mut last_x = 0usize;
        let mut last_y = 0usize;

        // Explicit base colors; ResetColor would fall back to the terminal's own.
        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(BASE_BG))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }
                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }
}

// ── Compose: build one frame ──

pub fn compose(buf: &mut FrameBuffer, s: &GameState, c: &Content, now: Millis) {
    buf.clear();

    match s.phase {
        Phase::Intro => compose_intro(buf, c, now),
        Phase::Start => compose_loading(buf, s, c, now),
        Phase::Round1 => compose_quiz(buf, s, c),
        Phase::Round2 => compose_wheel(buf, s, c, now),
        Phase::Chaos => compose_chaos(buf, s, c, now),
        Phase::Final => compose_final(buf, s, c, now),
    }

    if s.leaderboard_visible() {
        compose_leaderboard(buf, s, c, now);
    }
    if s.phase != Phase::Intro {
        let badge = if s.music_playing { "[M] \u{266A} on " } else { "[M] \u{266A} off" };
        let x = buf.width.saturating_sub(badge.chars().count() + 1);
        buf.put_str(x, 0, badge, if s.music_playing { PINK } else { DIM }, Color::Reset);
    }
    if s.board.easter_egg && s.leaderboard_visible() {
        compose_easter_egg(buf, c);
    }
    compose_footer(buf, s);
}

fn card_x(buf: &FrameBuffer) -> usize {
    center_x(CARD_W, buf.width)
}

fn compose_intro(buf: &mut FrameBuffer, c: &Content, now: Millis) {
    let title = [
        "\u{2554}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2557}",
        "\u{2551}  L O V E   B A T T L E \u{2551}",
        "\u{255A}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{255D}",
    ];
    let top = buf.height.saturating_sub(10) / 2;
    for (i, line) in title.iter().enumerate() {
        buf.put_centered(top + i, line, PINK, Color::Reset);
    }
    let versus = format!("{}  \u{2665}  {}", c.player_a, c.player_b);
    buf.put_centered(top + 4, &versus, ROSE, Color::Reset);
    if (now / 500) % 2 == 0 {
        buf.put_centered(top + 7, "Press ENTER to begin", GOLD, Color::Reset);
    }
}

fn compose_loading(buf: &mut FrameBuffer, s: &GameState, c: &Content, now: Millis) {
    let x = card_x(buf);
    let top = buf.height.saturating_sub(c.loading_lines.len() + 5) / 2;
    let blink = (now / 400) % 2 == 0;

    for (i, line) in c.loading_lines.iter().enumerate() {
        let y = top + i;
        if i < s.loading.line {
            buf.put_str(x, y, &format!("> {line}"), TERM_GREEN, Color::Reset);
        } else if i == s.loading.line {
            let typed: String = line.chars().take(s.loading.chars).collect();
            let cursor = if blink { "\u{2588}" } else { " " };
            buf.put_str(x, y, &format!("> {typed}{cursor}"), TERM_GREEN, Color::Reset);
        }
    }

    if s.loading.start_ready {
        let y = top + c.loading_lines.len() + 2;
        buf.put_centered(y, "[  START  ]", Color::Black, PINK);
        buf.put_centered(y + 1, "press ENTER", DIM, Color::Reset);
    }
}

fn compose_leaderboard(buf: &mut FrameBuffer, s: &GameState, c: &Content, now: Millis) {
    let x = card_x(buf);
    let (a, b) = s.shown_scores();
    let glitch = s.glitching();
    let standing = Standing::of(a, b);

    buf.fill_rect(x, BOARD_ROW, CARD_W, 4, PANEL);
    buf.put_str(x + 2, BOARD_ROW, "LEADERBOARD", GOLD, PANEL);

    let rows = [
        (standing == Standing::ALeads, &c.player_a, a),
        (standing == Standing::BLeads, &c.player_b, b),
    ];
    for (i, (leads, name, score)) in rows.into_iter().enumerate() {
        let crown = if leads { '\u{265B}' } else { ' ' };
        let line = format!("{crown} {name:<16} {score:>5}");
        let fg = if glitch {
            [BAD, TERM_GREEN, GOLD, ROSE][(noise(now / 100 + i as u64) % 4) as usize]
        } else if leads {
            GOLD
        } else {
            Color::White
        };
        buf.put_str(x + 2, BOARD_ROW + 1 + i, &line, fg, PANEL);
    }
    buf.put_str(x + CARD_W - 12, BOARD_ROW + 2, "[P] poke", DIM, PANEL);
}

/// Numbered options with the selection cursor.
fn compose_options(buf: &mut FrameBuffer, y: usize, options: &[String], cursor: usize, color: impl Fn(usize) -> Color) {
    let x = card_x(buf) + 2;
    for (i, opt) in options.iter().enumerate() {
        let marker = if i == cursor { '\u{25B8}' } else { ' ' };
        buf.put_str(x, y + i, &format!("{marker} {}. {opt}", i + 1), color(i), Color::Reset);
    }
}

fn compose_quiz(buf: &mut FrameBuffer, s: &GameState, c: &Content) {
    let x = card_x(buf);
    let total = c.questions.len();

    if s.quiz_done && s.card.locked.is_none() {
        buf.put_centered(CARD_ROW + 2, "Round 1 complete!", GOLD, Color::Reset);
        buf.put_centered(CARD_ROW + 4, "Get ready for the dare wheel...", ROSE, Color::Reset);
        return;
    }
    let Some(q) = c.questions.get(s.question_index) else {
        return;
    };

    let header = format!("ROUND 1  \u{00B7}  Question {}/{}", s.question_index + 1, total);
    buf.put_str(x, CARD_ROW, &header, PINK, Color::Reset);

    let mut y = CARD_ROW + 2;
    for line in wrap(&q.question, CARD_W) {
        buf.put_str(x, y, &line, Color::White, Color::Reset);
        y += 1;
    }
    y += 1;

    let locked = s.card.locked.as_ref();
    let cursor = if locked.is_some() { usize::MAX } else { s.cursor };
    compose_options(buf, y, &q.options, cursor, |i| match locked {
        Some(_) if q.is_correct(i) => GOOD,
        Some(l) if l.option == i => BAD,
        Some(_) => DIM,
        None if i == s.cursor => GOLD,
        None => Color::White,
    });
    y += q.options.len() + 1;

    if let Some(l) = locked {
        let fg = if l.correct { GOOD } else { BAD };
        for line in wrap(&l.feedback, CARD_W) {
            buf.put_str(x, y, &line, fg, Color::Reset);
            y += 1;
        }
    }
}

fn compose_wheel(buf: &mut FrameBuffer, s: &GameState, c: &Content, now: Millis) {
    let x = card_x(buf);
    let w = &s.wheel;
    let n = c.dares.len().max(1);
    let dare_no = (s.dares_completed + 1).min(DARES_PER_ROUND);
    buf.put_str(x, CARD_ROW, &format!("ROUND 2  \u{00B7}  Dare {dare_no}/{DARES_PER_ROUND}"), PINK, Color::Reset);

    // Ring of segments; the pointer sits over the highlighted one.
    let lit = if w.spinning {
        (now / 90) as usize % n
    } else if let Some(cur) = w.current {
        cur
    } else {
        (w.angle / (360.0 / n as f32)) as usize % n
    };
    let ring_x = center_x(n * 5, buf.width);
    for i in 0..n {
        let seg = format!("( {} )", i + 1);
        let (fg, bg) = if i == lit {
            (Color::Black, if w.spinning { GOLD } else { PINK })
        } else if w.used.contains(&i) {
            (DIM, Color::Reset)
        } else {
            (ROSE, Color::Reset)
        };
        buf.put_str(ring_x + i * 5, CARD_ROW + 3, &seg, fg, bg);
    }
    buf.put_str(ring_x + lit * 5 + 2, CARD_ROW + 2, "\u{25BC}", GOLD, Color::Reset);

    let y = CARD_ROW + 5;
    if s.dares_completed >= DARES_PER_ROUND {
        buf.put_centered(y, "All dares done!", GOLD, Color::Reset);
        return;
    }
    if w.spinning {
        buf.put_centered(y, "Spinning...", GOLD, Color::Reset);
        return;
    }
    let Some(cur) = w.current else {
        buf.put_centered(y, "Press ENTER to spin the wheel", ROSE, Color::Reset);
        return;
    };

    let mut y = y;
    if let Some(dare) = c.dares.get(cur) {
        for line in wrap(dare, CARD_W) {
            buf.put_centered(y, &line, Color::White, Color::Reset);
            y += 1;
        }
    }
    y += 1;
    match &w.response {
        Some(resp) => {
            for line in wrap(resp, CARD_W) {
                buf.put_centered(y, &line, GOLD, Color::Reset);
                y += 1;
            }
        }
        None => {
            let choices = ["Completed (Y)".to_string(), "Skipped (N)".to_string()];
            compose_options(buf, y, &choices, s.cursor, |i| {
                if i == s.cursor { GOLD } else { Color::White }
            });
        }
    }
}

fn compose_chaos(buf: &mut FrameBuffer, s: &GameState, c: &Content, now: Millis) {
    let x = card_x(buf);
    match s.chaos {
        ChaosStage::Asking => {
            buf.put_str(x, CARD_ROW, "CHAOS ROUND", BAD, Color::Reset);
            buf.put_str(x, CARD_ROW + 2, &c.chaos_question, Color::White, Color::Reset);
            compose_options(buf, CARD_ROW + 4, &c.chaos_options, s.cursor, |i| {
                if i == s.cursor { GOLD } else { Color::White }
            });
        }
        ChaosStage::Glitching => {
            let frame = now / 60;
            for row in 0..6 {
                let line: String = (0..CARD_W)
                    .map(|col| {
                        let r = noise(frame * 131 + row * 977 + col as u64);
                        match r % 9 {
                            0 => '#',
                            1 => '%',
                            2 => '\u{2591}',
                            3 => '\u{2592}',
                            4 => '@',
                            _ => ' ',
                        }
                    })
                    .collect();
                let fg = [BAD, TERM_GREEN, PINK][(noise(frame + row) % 3) as usize];
                buf.put_str(x, CARD_ROW + row as usize, &line, fg, Color::Reset);
            }
            buf.put_centered(CARD_ROW + 7, "RECALCULATING LOVE...", BAD, Color::Reset);
        }
        stage => {
            if let Some(i) = stage.message_index() {
                let fg = if i == 0 { BAD } else { ROSE };
                let y = buf.height / 2;
                buf.put_centered(y, &c.chaos_messages[i], fg, Color::Reset);
            }
        }
    }
}

fn compose_final(buf: &mut FrameBuffer, s: &GameState, c: &Content, now: Millis) {
    let f = &s.finale;
    if f.accepted {
        let top = buf.height.saturating_sub(8) / 2;
        let hearts: String = (0..24)
            .map(|i| if (i + (now / 300) as usize) % 3 == 0 { '\u{2665}' } else { ' ' })
            .collect();
        buf.put_centered(top, &hearts, PINK, Color::Reset);
        buf.put_centered(top + 2, &c.forever_title, GOLD, Color::Reset);
        buf.put_centered(top + 4, &c.forever_subtitle, ROSE, Color::Reset);
        buf.put_centered(top + 6, &hearts, PINK, Color::Reset);
        return;
    }

    let lines: Vec<String> = c.final_lines.iter().flat_map(|l| wrap(l, CARD_W)).collect();
    let mut y = buf.height.saturating_sub(lines.len() + 8) / 2;
    for line in &lines {
        buf.put_centered(y, line, ROSE, Color::Reset);
        y += 1;
    }
    y += 1;
    buf.put_centered(y, &c.final_question, PINK, Color::Reset);
    y += 3;

    let mid = buf.width / 2;
    let yes_x = mid.saturating_sub(YES_BUTTON.chars().count() + 3);
    let (yes_fg, yes_bg) = if s.cursor == 0 { (Color::Black, PINK) } else { (PINK, Color::Reset) };
    buf.put_str(yes_x, y, YES_BUTTON, yes_fg, yes_bg);

    let (no_x, no_y) = match f.no_offset {
        Some((nx, ny)) => (nx as usize, ny as usize),
        None => (mid + 3, y),
    };
    let (no_fg, no_bg) = if s.cursor == 1 { (Color::Black, DIM) } else { (DIM, Color::Reset) };
    buf.put_str(no_x, no_y, NO_BUTTON, no_fg, no_bg);
}

fn compose_easter_egg(buf: &mut FrameBuffer, c: &Content) {
    let lines = wrap(&c.easter_egg, 36);
    let w = 40.min(buf.width);
    let h = lines.len() + 2;
    let x = center_x(w, buf.width);
    let y = buf.height.saturating_sub(h) / 2;
    buf.fill_rect(x, y, w, h, PINK);
    for (i, line) in lines.iter().enumerate() {
        buf.put_str(x + 2, y + 1 + i, line, Color::Black, PINK);
    }
}

fn compose_footer(buf: &mut FrameBuffer, s: &GameState) {
    let help = match s.phase {
        Phase::Intro => "ENTER begin   Q quit",
        Phase::Start if s.loading.start_ready => "ENTER start   M music   Q quit",
        Phase::Start => "M music   Q quit",
        Phase::Round1 | Phase::Chaos => "\u{2191}\u{2193} move   ENTER / 1-4 answer   P poke   M music   Q quit",
        Phase::Round2 => "ENTER spin   Y/N dare   P poke   M music   Q quit",
        Phase::Final => "\u{2190}\u{2192} move   ENTER choose   M music   Q quit",
    };
    let y = buf.height.saturating_sub(1);
    buf.put_centered(y, help, DIM, Color::Reset);
}
