pub mod question_timelines;
