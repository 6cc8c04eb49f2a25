use model::{Trajectory, TrajectoryPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress<'a> {
    pub percent: f64,
    pub current_point: Option<&'a TrajectoryPoint>,
}

/// 0 for one or zero points, otherwise the cursor's share of the last index.
pub fn progress_percent(cursor_index: usize, total_points: usize) -> f64 {
    if total_points <= 1 {
        return 0.0;
    }
    let last = (total_points - 1) as f64;
    (cursor_index as f64 / last * 100.0).min(100.0)
}

pub fn project(trajectory: &Trajectory, cursor_index: usize) -> Progress<'_> {
    Progress {
        percent: progress_percent(cursor_index, trajectory.len()),
        current_point: trajectory.get(cursor_index),
    }
}
