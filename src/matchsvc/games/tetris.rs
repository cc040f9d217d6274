//! Tetris: two independent boards racing for score over one minute.
//!
//! Both boards draw identical piece sequences from the shared seed, so the
//! duel is decided by play, not luck. A full board ends the match early;
//! otherwise the higher score wins when time runs out.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{MatchSim, Outcome, SlotScore};
use crate::protocol::{EndReason, PlayerSlot, Winner};

pub const BOARD_WIDTH: i32 = 10;
pub const BOARD_HEIGHT: i32 = 20;

const GRAVITY_INTERVAL: Duration = Duration::from_millis(400);
const MATCH_DURATION: Duration = Duration::from_secs(60);

/// (row, col) offsets per rotation for the seven tetrominoes:
/// I, O, T, J, L, S, Z.
const PIECE_SHAPES: [&[[(i32, i32); 4]]; 7] = [
    // I
    &[
        [(0, -2), (0, -1), (0, 0), (0, 1)],
        [(-2, 0), (-1, 0), (0, 0), (1, 0)],
    ],
    // O
    &[[(0, 0), (0, 1), (1, 0), (1, 1)]],
    // T
    &[
        [(0, -1), (0, 0), (0, 1), (1, 0)],
        [(-1, 0), (0, 0), (1, 0), (0, -1)],
        [(0, -1), (0, 0), (0, 1), (-1, 0)],
        [(-1, 0), (0, 0), (1, 0), (0, 1)],
    ],
    // J
    &[
        [(0, -1), (0, 0), (0, 1), (-1, 1)],
        [(-1, 0), (0, 0), (1, 0), (1, 1)],
        [(0, -1), (0, 0), (0, 1), (1, -1)],
        [(-1, -1), (-1, 0), (0, 0), (1, 0)],
    ],
    // L
    &[
        [(0, -1), (0, 0), (0, 1), (-1, -1)],
        [(-1, 0), (0, 0), (1, 0), (1, -1)],
        [(0, -1), (0, 0), (0, 1), (1, 1)],
        [(-1, 1), (-1, 0), (0, 0), (1, 0)],
    ],
    // S
    &[
        [(0, -1), (0, 0), (1, 0), (1, 1)],
        [(-1, 1), (0, 0), (0, 1), (1, 0)],
    ],
    // Z
    &[
        [(0, 0), (0, 1), (1, -1), (1, 0)],
        [(-1, 0), (0, 0), (0, 1), (1, 1)],
    ],
];

/// Points per simultaneous line clear (1 through 4 lines).
const SCORING: [i64; 5] = [0, 100, 300, 500, 800];

/// One falling tetromino.
#[derive(Debug, Clone)]
struct Piece {
    shape_id: usize,
    rotation: usize,
    x: i32,
    y: i32,
}

impl Piece {
    fn new(shape_id: usize) -> Self {
        Self {
            shape_id,
            rotation: 0,
            x: BOARD_WIDTH / 2,
            // The I piece spawns one row lower so its vertical rotation fits.
            y: if shape_id == 0 { 1 } else { 0 },
        }
    }

    fn rotations(&self) -> &'static [[(i32, i32); 4]] {
        PIECE_SHAPES[self.shape_id]
    }

    fn blocks_at(&self, rotation: usize) -> [(i32, i32); 4] {
        let shape = self.rotations()[rotation % self.rotations().len()];
        shape.map(|(r, c)| (self.y + r, self.x + c))
    }

    fn blocks(&self) -> [(i32, i32); 4] {
        self.blocks_at(self.rotation)
    }

    fn next_rotation_blocks(&self) -> [(i32, i32); 4] {
        self.blocks_at(self.rotation + 1)
    }
}

/// One player's board: the authoritative state the server mutates.
#[derive(Debug)]
pub struct TetrisBoard {
    board: Vec<Vec<u8>>,
    score: i64,
    lines_cleared: u32,
    game_over: bool,
    rng: StdRng,
    bag: Vec<usize>,
    current: Option<Piece>,
    next: Piece,
}

impl TetrisBoard {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bag = Vec::new();
        let next = Piece::new(draw_from_bag(&mut bag, &mut rng));
        let mut this = Self {
            board: vec![vec![0; BOARD_WIDTH as usize]; BOARD_HEIGHT as usize],
            score: 0,
            lines_cleared: 0,
            game_over: false,
            rng,
            bag,
            current: None,
            next,
        };
        this.spawn_piece();
        this
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn lines_cleared(&self) -> u32 {
        self.lines_cleared
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    fn spawn_piece(&mut self) {
        let next_id = draw_from_bag(&mut self.bag, &mut self.rng);
        let piece = std::mem::replace(&mut self.next, Piece::new(next_id));
        if self.collides(&piece.blocks()) {
            // Spawn collision: the board is full.
            self.game_over = true;
            self.current = None;
        } else {
            self.current = Some(piece);
        }
    }

    fn collides(&self, blocks: &[(i32, i32)]) -> bool {
        blocks.iter().any(|&(y, x)| {
            x < 0
                || x >= BOARD_WIDTH
                || y >= BOARD_HEIGHT
                || (y >= 0 && self.board[y as usize][x as usize] != 0)
        })
    }

    pub fn shift(&mut self, dx: i32) {
        if self.game_over {
            return;
        }
        let Some(piece) = &self.current else {
            return;
        };
        let moved: Vec<(i32, i32)> = piece.blocks().iter().map(|&(y, x)| (y, x + dx)).collect();
        if !self.collides(&moved) {
            if let Some(piece) = &mut self.current {
                piece.x += dx;
            }
        }
    }

    pub fn rotate(&mut self) {
        if self.game_over {
            return;
        }
        let Some(piece) = &self.current else {
            return;
        };
        // Simple rotation, no wall kicks.
        let rotated = piece.next_rotation_blocks();
        if !self.collides(&rotated) {
            if let Some(piece) = &mut self.current {
                piece.rotation += 1;
            }
        }
    }

    /// One gravity step: descend, locking on contact.
    pub fn soft_drop(&mut self) {
        if self.game_over {
            return;
        }
        let Some(piece) = &self.current else {
            return;
        };
        let lowered: Vec<(i32, i32)> = piece.blocks().iter().map(|&(y, x)| (y + 1, x)).collect();
        if self.collides(&lowered) {
            self.lock_piece();
        } else if let Some(piece) = &mut self.current {
            piece.y += 1;
        }
    }

    /// Drop straight to the floor and lock.
    pub fn hard_drop(&mut self) {
        if self.game_over || self.current.is_none() {
            return;
        }
        loop {
            let Some(piece) = &self.current else {
                return;
            };
            let lowered: Vec<(i32, i32)> =
                piece.blocks().iter().map(|&(y, x)| (y + 1, x)).collect();
            if self.collides(&lowered) {
                break;
            }
            if let Some(piece) = &mut self.current {
                piece.y += 1;
            }
        }
        self.lock_piece();
    }

    fn lock_piece(&mut self) {
        let Some(piece) = self.current.take() else {
            return;
        };
        for (y, x) in piece.blocks() {
            if (0..BOARD_HEIGHT).contains(&y) && (0..BOARD_WIDTH).contains(&x) {
                self.board[y as usize][x as usize] = piece.shape_id as u8 + 1;
            }
        }
        self.clear_lines();
        self.spawn_piece();
    }

    fn clear_lines(&mut self) {
        let before = self.board.len();
        self.board.retain(|row| row.iter().any(|&cell| cell == 0));
        let cleared = before - self.board.len();
        if cleared > 0 {
            self.score += SCORING[cleared.min(4)];
            self.lines_cleared += cleared as u32;
            for _ in 0..cleared {
                self.board.insert(0, vec![0; BOARD_WIDTH as usize]);
            }
        }
    }

    fn snapshot(&self) -> Value {
        let current_piece = self.current.as_ref().map(|piece| {
            json!({
                "shape_id": piece.shape_id,
                "blocks": piece.blocks(),
            })
        });
        // Preview uses the base rotation, offset into view.
        let preview: Vec<(i32, i32)> = PIECE_SHAPES[self.next.shape_id][0]
            .iter()
            .map(|&(r, c)| (r, c + 3))
            .collect();

        json!({
            "board": self.board,
            "score": self.score,
            "lines": self.lines_cleared,
            "game_over": self.game_over,
            "current_piece": current_piece,
            "next_piece": {
                "shape_id": self.next.shape_id,
                "blocks": preview,
            },
        })
    }
}

fn draw_from_bag(bag: &mut Vec<usize>, rng: &mut StdRng) -> usize {
    if bag.is_empty() {
        *bag = (0..PIECE_SHAPES.len()).collect();
        bag.shuffle(rng);
    }
    bag.pop().unwrap_or(0)
}

/// The two-board duel exposed to the match framework.
pub struct TetrisMatch {
    boards: [TetrisBoard; 2],
}

impl MatchSim for TetrisMatch {
    fn from_seed(seed: u64) -> Self {
        // Same seed on both boards: identical piece sequences.
        Self {
            boards: [TetrisBoard::new(seed), TetrisBoard::new(seed)],
        }
    }

    fn apply_input(&mut self, slot: PlayerSlot, action: &str) {
        let board = &mut self.boards[slot.index()];
        match action {
            "MOVE_LEFT" => board.shift(-1),
            "MOVE_RIGHT" => board.shift(1),
            "ROTATE" => board.rotate(),
            "SOFT_DROP" => board.soft_drop(),
            "HARD_DROP" => board.hard_drop(),
            other => tracing::debug!(action = other, "ignoring unknown input"),
        }
    }

    fn tick(&mut self) {
        for board in &mut self.boards {
            board.soft_drop();
        }
    }

    fn outcome(&self) -> Option<Outcome> {
        if self.boards[0].is_game_over() {
            Some(Outcome {
                winner: Winner::P2,
                reason: EndReason::BoardFull,
            })
        } else if self.boards[1].is_game_over() {
            Some(Outcome {
                winner: Winner::P1,
                reason: EndReason::BoardFull,
            })
        } else {
            None
        }
    }

    fn final_outcome(&self) -> Outcome {
        let (p1, p2) = (self.boards[0].score(), self.boards[1].score());
        match p1.cmp(&p2) {
            std::cmp::Ordering::Greater => Outcome {
                winner: Winner::P1,
                reason: EndReason::TimeUp,
            },
            std::cmp::Ordering::Less => Outcome {
                winner: Winner::P2,
                reason: EndReason::TimeUp,
            },
            std::cmp::Ordering::Equal => Outcome {
                winner: Winner::Tie,
                reason: EndReason::Tie,
            },
        }
    }

    fn snapshot(&self, remaining_secs: u64) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("p1_state".into(), self.boards[0].snapshot());
        state.insert("p2_state".into(), self.boards[1].snapshot());
        state.insert("remaining_time".into(), remaining_secs.into());
        state
    }

    fn scores(&self) -> [SlotScore; 2] {
        [
            (self.boards[0].score(), self.boards[0].lines_cleared()),
            (self.boards[1].score(), self.boards[1].lines_cleared()),
        ]
    }

    fn tick_interval(&self) -> Duration {
        GRAVITY_INTERVAL
    }

    fn match_duration(&self) -> Duration {
        MATCH_DURATION
    }
}
