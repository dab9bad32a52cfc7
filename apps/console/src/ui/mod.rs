pub mod question_chart;
