//! Snake: two snakes on one shared grid, racing for food.
//!
//! Crashing into a wall, yourself, or the other snake ends the match for
//! the survivor; a head-on collision on the same step is a tie. If both
//! snakes are still alive at the time limit the higher score wins.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::time::Duration;

use super::{MatchSim, Outcome, SlotScore};
use crate::protocol::{EndReason, PlayerSlot, Winner};

pub const GRID_WIDTH: i32 = 24;
pub const GRID_HEIGHT: i32 = 18;

const STEP_INTERVAL: Duration = Duration::from_millis(150);
const MATCH_DURATION: Duration = Duration::from_secs(120);
const INITIAL_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    fn from_action(action: &str) -> Option<Self> {
        match action {
            "UP" => Some(Self::Up),
            "DOWN" => Some(Self::Down),
            "LEFT" => Some(Self::Left),
            "RIGHT" => Some(Self::Right),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

#[derive(Debug)]
struct Snake {
    /// Head first.
    body: VecDeque<(i32, i32)>,
    direction: Direction,
    /// Direction queued by input, applied at the next step.
    pending: Direction,
    score: i64,
    alive: bool,
}

impl Snake {
    fn new(head: (i32, i32), direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        let body = (0..INITIAL_LENGTH as i32)
            .map(|i| (head.0 - dx * i, head.1 - dy * i))
            .collect();
        Self {
            body,
            direction,
            pending: direction,
            score: 0,
            alive: true,
        }
    }

    fn head(&self) -> (i32, i32) {
        *self.body.front().unwrap_or(&(0, 0))
    }

    fn steer(&mut self, direction: Direction) {
        // Reversing into yourself is ignored, not fatal.
        if direction != self.direction.opposite() {
            self.pending = direction;
        }
    }

    fn snapshot(&self) -> Value {
        json!({
            "body": self.body,
            "score": self.score,
            "alive": self.alive,
            "direction": self.direction.name(),
        })
    }
}

/// The shared-grid duel exposed to the match framework.
pub struct SnakeMatch {
    snakes: [Snake; 2],
    food: (i32, i32),
    rng: StdRng,
    finished: Option<Outcome>,
}

impl SnakeMatch {
    fn spawn_food(&mut self) {
        // Rejection-sample a free cell; the grid is far from full in any
        // realistic match.
        for _ in 0..1024 {
            let candidate = (
                self.rng.random_range(0..GRID_WIDTH),
                self.rng.random_range(0..GRID_HEIGHT),
            );
            let occupied = self
                .snakes
                .iter()
                .any(|snake| snake.body.contains(&candidate));
            if !occupied {
                self.food = candidate;
                return;
            }
        }
        self.food = (0, 0);
    }

    fn step(&mut self) {
        if self.finished.is_some() {
            return;
        }

        // Commit queued directions, then move both heads simultaneously.
        for snake in &mut self.snakes {
            snake.direction = snake.pending;
        }
        let new_heads: [(i32, i32); 2] = [
            advance(self.snakes[0].head(), self.snakes[0].direction),
            advance(self.snakes[1].head(), self.snakes[1].direction),
        ];

        let mut crashed = [false, false];
        for (i, &head) in new_heads.iter().enumerate() {
            let (x, y) = head;
            if !(0..GRID_WIDTH).contains(&x) || !(0..GRID_HEIGHT).contains(&y) {
                crashed[i] = true;
                continue;
            }
            // Head-on: both snakes claim the same cell on the same step.
            if new_heads[1 - i] == head {
                crashed[i] = true;
                continue;
            }
            // Any body cell, own or the opponent's, is deadly. Tails are
            // about to move but count as occupied, matching the grid the
            // players saw when they steered.
            if self
                .snakes
                .iter()
                .any(|snake| snake.body.contains(&head))
            {
                crashed[i] = true;
            }
        }

        match crashed {
            [true, true] => {
                self.snakes[0].alive = false;
                self.snakes[1].alive = false;
                self.finished = Some(Outcome {
                    winner: Winner::Tie,
                    reason: EndReason::Tie,
                });
                return;
            }
            [true, false] => {
                self.snakes[0].alive = false;
                self.finished = Some(Outcome {
                    winner: Winner::P2,
                    reason: EndReason::Win,
                });
                return;
            }
            [false, true] => {
                self.snakes[1].alive = false;
                self.finished = Some(Outcome {
                    winner: Winner::P1,
                    reason: EndReason::Win,
                });
                return;
            }
            [false, false] => {}
        }

        let mut ate = [false, false];
        for (i, &head) in new_heads.iter().enumerate() {
            self.snakes[i].body.push_front(head);
            if head == self.food {
                self.snakes[i].score += 1;
                ate[i] = true;
            } else {
                self.snakes[i].body.pop_back();
            }
        }
        if ate[0] || ate[1] {
            self.spawn_food();
        }
    }
}

fn advance(head: (i32, i32), direction: Direction) -> (i32, i32) {
    let (dx, dy) = direction.delta();
    (head.0 + dx, head.1 + dy)
}

impl MatchSim for SnakeMatch {
    fn from_seed(seed: u64) -> Self {
        let rng = StdRng::seed_from_u64(seed);
        let mid = GRID_HEIGHT / 2;
        let mut this = Self {
            snakes: [
                Snake::new((5, mid), Direction::Right),
                Snake::new((GRID_WIDTH - 6, mid), Direction::Left),
            ],
            food: (GRID_WIDTH / 2, mid),
            rng,
            finished: None,
        };
        this.spawn_food();
        this
    }

    fn apply_input(&mut self, slot: PlayerSlot, action: &str) {
        match Direction::from_action(action) {
            Some(direction) => self.snakes[slot.index()].steer(direction),
            None => tracing::debug!(action, "ignoring unknown input"),
        }
    }

    fn tick(&mut self) {
        self.step();
    }

    fn outcome(&self) -> Option<Outcome> {
        self.finished
    }

    fn final_outcome(&self) -> Outcome {
        if let Some(outcome) = self.finished {
            return outcome;
        }
        let (p1, p2) = (self.snakes[0].score, self.snakes[1].score);
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
        state.insert("grid_width".into(), GRID_WIDTH.into());
        state.insert("grid_height".into(), GRID_HEIGHT.into());
        state.insert("p1".into(), self.snakes[0].snapshot());
        state.insert("p2".into(), self.snakes[1].snapshot());
        state.insert("food".into(), json!(self.food));
        state.insert("remaining_time".into(), remaining_secs.into());
        state
    }

    fn scores(&self) -> [SlotScore; 2] {
        [(self.snakes[0].score, 0), (self.snakes[1].score, 0)]
    }

    fn tick_interval(&self) -> Duration {
        STEP_INTERVAL
    }

    fn match_duration(&self) -> Duration {
        MATCH_DURATION
    }
}
