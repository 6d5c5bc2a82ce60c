// Season data model: games, schedules, picks, week keys.

pub mod game;
pub mod pick;
