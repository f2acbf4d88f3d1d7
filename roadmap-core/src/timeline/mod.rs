//! Timeline layout engine: turns epics into positioned, renderer-ready bars.

pub mod allocation;
pub mod position;
pub mod sprint;
pub mod view;

pub use allocation::{story_position, story_positions, STORY_FILL};
pub use position::{
    bar_geometry, bar_start, bar_width, day_of_year, quarter_start_percent,
    quarter_width_percent, today_position, today_position_on, BarGeometry, DAYS_IN_YEAR,
};
pub use sprint::{distinct_sprints, quarter_board, sprint_board, QuarterBucket, SprintBoard};
pub use view::{
    gantt_chart, gantt_chart_on, portfolio_chart, portfolio_chart_on, EpicRow, Expansion,
    GanttChart, PortfolioChart, ProductLane, StoryRow, TimelineHeader,
};
