use rayon::prelude::*;
use serde::Serialize;
use valuation_core::numeric::clamp;

use crate::policy::ValuationPolicy;
use crate::valuation::{value_firm, DiscountRate, EquityBridge};

pub const SENS_WACC_BOUNDS: (f64, f64) = (0.03, 0.20);
pub const SENS_GROWTH_BOUNDS: (f64, f64) = (0.01, 0.06);

/// Per-share value over terminal growth (rows) and WACC (columns).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityGrid {
    pub wacc_axis: [f64; 3],
    pub growth_axis: [f64; 3],
    pub grid: [[Option<f64>; 3]; 3],
}

impl SensitivityGrid {
    pub fn center(&self) -> Option<f64> {
        self.grid[1][1]
    }
}

fn axis(base: f64, step: f64, bounds: (f64, f64)) -> [f64; 3] {
    [
        clamp(base - step, bounds.0, bounds.1),
        base,
        clamp(base + step, bounds.0, bounds.1),
    ]
}

/// Revalue the FCFF path at each (growth, WACC) pair. Cells are independent and
/// computed in parallel; a cell that cannot be valued is `None`.
pub fn sensitivity_grid(
    fcff: &[f64],
    wacc: f64,
    terminal_growth: f64,
    midyear: bool,
    bridge: &EquityBridge,
    policy: &ValuationPolicy,
) -> SensitivityGrid {
    let wacc_axis = axis(wacc, policy.sens_wacc_step, SENS_WACC_BOUNDS);
    let growth_axis = axis(terminal_growth, policy.sens_growth_step, SENS_GROWTH_BOUNDS);

    let cells: Vec<Option<f64>> = (0..9usize)
        .into_par_iter()
        .map(|idx| {
            let g = growth_axis[idx / 3];
            let w = wacc_axis[idx % 3];
            value_firm(fcff, &DiscountRate::Constant(w), g, midyear, bridge)
                .ok()
                .and_then(|r| r.intrinsic_value_per_share)
        })
        .collect();

    let mut grid = [[None; 3]; 3];
    for (idx, cell) in cells.into_iter().enumerate() {
        grid[idx / 3][idx % 3] = cell;
    }

    SensitivityGrid {
        wacc_axis,
        growth_axis,
        grid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::dcf_valuation;

    const FCFF: [f64; 5] = [100.0, 104.0, 108.0, 112.0, 115.0];

    fn bridge() -> EquityBridge {
        EquityBridge {
            cash: 200.0,
            debt: 300.0,
            shares_outstanding: Some(50.0),
        }
    }

    #[test]
    fn test_grid_shape_axes_and_center() {
        let policy = ValuationPolicy::default();
        let grid = sensitivity_grid(&FCFF, 0.09, 0.03, true, &bridge(), &policy);

        assert!(grid.wacc_axis.windows(2).all(|w| w[0] < w[1]));
        assert!(grid.growth_axis.windows(2).all(|g| g[0] < g[1]));
        assert!((grid.wacc_axis[0] - 0.075).abs() < 1e-12);
        assert!((grid.growth_axis[2] - 0.035).abs() < 1e-12);

        let base = dcf_valuation(&FCFF, 0.09, 0.03, true, 200.0, 300.0, Some(50.0))
            .unwrap()
            .intrinsic_value_per_share
            .unwrap();
        assert!((grid.center().unwrap() - base).abs() < 1e-9);
        assert!(grid.grid.iter().flatten().all(|c| c.is_some()));
    }

    #[test]
    fn test_value_falls_with_wacc_and_rises_with_growth() {
        let grid = sensitivity_grid(&FCFF, 0.10, 0.025, false, &bridge(), &ValuationPolicy::default());
        for row in grid.grid.iter() {
            let values: Vec<f64> = row.iter().map(|c| c.unwrap()).collect();
            assert!(values.windows(2).all(|v| v[0] > v[1]));
        }
        for col in 0..3 {
            assert!(grid.grid[0][col].unwrap() < grid.grid[2][col].unwrap());
        }
    }

    #[test]
    fn test_axes_clamped_to_domain() {
        let grid = sensitivity_grid(&FCFF, 0.195, 0.058, true, &bridge(), &ValuationPolicy::default());
        assert_eq!(grid.wacc_axis[2], 0.20);
        assert_eq!(grid.growth_axis[2], 0.06);
        assert_eq!(grid.wacc_axis[1], 0.195);
    }

    #[test]
    fn test_failing_cells_are_null() {
        let grid = sensitivity_grid(&[0.0, 1.0], 0.10, 0.03, true, &bridge(), &ValuationPolicy::default());
        assert!(grid.grid.iter().flatten().all(|c| c.is_none()));

        let no_shares = EquityBridge {
            shares_outstanding: None,
            ..bridge()
        };
        let grid = sensitivity_grid(&FCFF, 0.10, 0.03, true, &no_shares, &ValuationPolicy::default());
        assert!(grid.center().is_none());
    }
}
