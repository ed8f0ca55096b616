pub mod audio;
pub mod challenge_solver;
pub mod record_writer;
pub mod transcription;

pub use audio::{AudioClip, AudioFormat, AudioTranscoder};
pub use challenge_solver::{select_answer, ChallengeSolver};
pub use record_writer::RecordWriter;
pub use transcription::{parse_transcription, HttpTranscriptionClient, TranscriptionService};
