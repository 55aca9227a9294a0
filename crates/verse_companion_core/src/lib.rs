pub mod domain;
pub mod engagement;
pub mod ports;

pub use domain::{
    AuthSession, DailyVerse, Message, MessageRole, Profile, UserCredentials, VerseContent,
};
pub use engagement::{StreakUpdate, VerseResolution};
pub use ports::{DatabaseService, PortError, PortResult, ReflectionService, VerseProvider};
