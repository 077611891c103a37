// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Serialize;

/// Average Base block time used for estimates.
pub const ESTIMATED_BLOCK_TIME_SECS: u64 = 2;

/// How far the chain has progressed through a season.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonProgress {
    pub season_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub current_block: u64,
    pub blocks_remaining: u64,
    /// Fraction of the season elapsed, in `0.0..=1.0`.
    pub progress: f64,
    pub estimated_seconds_remaining: u64,
    pub ended: bool,
}

pub fn season_progress(season_id: u64, start_block: u64, end_block: u64, head: u64) -> SeasonProgress {
    let total = end_block.saturating_sub(start_block);
    let elapsed = head.saturating_sub(start_block).min(total);
    let blocks_remaining = end_block.saturating_sub(head);
    let progress = if total == 0 { 1.0 } else { elapsed as f64 / total as f64 };
    SeasonProgress {
        season_id,
        start_block,
        end_block,
        current_block: head,
        blocks_remaining,
        progress,
        estimated_seconds_remaining: blocks_remaining.saturating_mul(ESTIMATED_BLOCK_TIME_SECS),
        ended: blocks_remaining == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midway() {
        let progress = season_progress(1, 1_000, 2_000, 1_250);
        assert_eq!(progress.blocks_remaining, 750);
        assert_eq!(progress.estimated_seconds_remaining, 1_500);
        assert!((progress.progress - 0.25).abs() < f64::EPSILON);
        assert!(!progress.ended);
    }

    #[test]
    fn clamps_outside_the_season() {
        let before = season_progress(1, 1_000, 2_000, 900);
        assert_eq!(before.progress, 0.0);
        assert_eq!(before.blocks_remaining, 1_100);

        let after = season_progress(1, 1_000, 2_000, 5_000);
        assert_eq!(after.progress, 1.0);
        assert_eq!(after.blocks_remaining, 0);
        assert!(after.ended);
    }
}
