use serde::{Deserialize, Serialize};

pub const DEFAULT_FIELD_WIDTH: f32 = 800.0;
pub const DEFAULT_FIELD_HEIGHT: f32 = 600.0;
pub const DEFAULT_PADDLE_WIDTH: f32 = 10.0;
pub const DEFAULT_PADDLE_HEIGHT: f32 = 100.0;
pub const DEFAULT_PADDLE_SPEED: f32 = 8.0;
pub const DEFAULT_PADDLE_MARGIN: f32 = 20.0;
pub const DEFAULT_BALL_RADIUS: f32 = 8.0;
pub const DEFAULT_BALL_SPEED: f32 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Menu,
    Playing,
    Paused,
    MatchOver,
    GameOver,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Menu => "menu",
            GameStatus::Playing => "playing",
            GameStatus::Paused => "paused",
            GameStatus::MatchOver => "matchOver",
            GameStatus::GameOver => "gameOver",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == GameStatus::GameOver
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which seat a client occupies. Player 1 drives the left paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerSide {
    Player1,
    Player2,
}

impl PlayerSide {
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(PlayerSide::Player1),
            2 => Some(PlayerSide::Player2),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            PlayerSide::Player1 => 1,
            PlayerSide::Player2 => 2,
        }
    }

    pub fn opponent(&self) -> Self {
        match self {
            PlayerSide::Player1 => PlayerSide::Player2,
            PlayerSide::Player2 => PlayerSide::Player1,
        }
    }
}

fn default_ball_speed() -> f32 {
    DEFAULT_BALL_SPEED
}

fn default_ball_radius() -> f32 {
    DEFAULT_BALL_RADIUS
}

fn default_paddle_width() -> f32 {
    DEFAULT_PADDLE_WIDTH
}

fn default_paddle_height() -> f32 {
    DEFAULT_PADDLE_HEIGHT
}

fn default_paddle_speed() -> f32 {
    DEFAULT_PADDLE_SPEED
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub dx: f32,
    #[serde(default)]
    pub dy: f32,
    #[serde(default = "default_ball_speed")]
    pub speed: f32,
    #[serde(default = "default_ball_radius")]
    pub radius: f32,
}

impl Ball {
    pub fn centered(field_width: f32, field_height: f32) -> Self {
        Self {
            x: field_width / 2.0,
            y: field_height / 2.0,
            dx: 0.0,
            dy: 0.0,
            speed: DEFAULT_BALL_SPEED,
            radius: DEFAULT_BALL_RADIUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_paddle_width")]
    pub width: f32,
    #[serde(default = "default_paddle_height")]
    pub height: f32,
    #[serde(default = "default_paddle_speed")]
    pub speed: f32,
    #[serde(default)]
    pub score: u32,
}

impl Paddle {
    pub fn new(x: f32, field_height: f32) -> Self {
        Self {
            x,
            y: (field_height - DEFAULT_PADDLE_HEIGHT) / 2.0,
            width: DEFAULT_PADDLE_WIDTH,
            height: DEFAULT_PADDLE_HEIGHT,
            speed: DEFAULT_PADDLE_SPEED,
            score: 0,
        }
    }

    /// Largest `y` that keeps the paddle fully inside the field.
    pub fn max_y(&self, field_height: f32) -> f32 {
        (field_height - self.height).max(0.0)
    }

    pub fn clamp_y(&self, y: f32, field_height: f32) -> f32 {
        y.clamp(0.0, self.max_y(field_height))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchWins {
    #[serde(default)]
    pub player1: u32,
    #[serde(default)]
    pub player2: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub ball: Ball,
    pub left_paddle: Paddle,
    pub right_paddle: Paddle,
    #[serde(default)]
    pub match_wins: MatchWins,
    #[serde(default)]
    pub current_match: u32,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub winner: Option<PlayerSide>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_WIDTH, DEFAULT_FIELD_HEIGHT)
    }
}

impl GameState {
    pub fn new(field_width: f32, field_height: f32) -> Self {
        let right_x = field_width - DEFAULT_PADDLE_MARGIN - DEFAULT_PADDLE_WIDTH;
        Self {
            ball: Ball::centered(field_width, field_height),
            left_paddle: Paddle::new(DEFAULT_PADDLE_MARGIN, field_height),
            right_paddle: Paddle::new(right_x, field_height),
            match_wins: MatchWins::default(),
            current_match: 1,
            status: GameStatus::Waiting,
            winner: None,
        }
    }

    pub fn paddle(&self, side: PlayerSide) -> &Paddle {
        match side {
            PlayerSide::Player1 => &self.left_paddle,
            PlayerSide::Player2 => &self.right_paddle,
        }
    }

    pub fn paddle_mut(&mut self, side: PlayerSide) -> &mut Paddle {
        match side {
            PlayerSide::Player1 => &mut self.left_paddle,
            PlayerSide::Player2 => &mut self.right_paddle,
        }
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.left_paddle.score, self.right_paddle.score)
    }
}
