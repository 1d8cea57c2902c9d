//! Discounted-cash-flow valuation: capital costs, FCFF estimation and
//! projection, discounting, sensitivity and the request-level engine.

pub mod assumptions;
pub mod capital_cost;
pub mod capital_structure;
pub mod chain;
pub mod engine;
pub mod fcff;
pub mod growth;
pub mod policy;
pub mod sensitivity;
pub mod snapshot;
pub mod statements;
pub mod valuation;


pub use assumptions::{dynamic_assumptions, wacc_from_assumptions, StaticAssumptionTable, WaccBreakdown};
pub use capital_cost::{estimate_cost_of_capital, CapitalCostInputs, CostOfCapital, WaccPath};
pub use engine::{
    compute_report, AssumptionComparison, AssumptionOrigin, AvailableCompany, CompanyAssumptionsView, DcfEngine,
    MarketInputs, ValuationReport, ValuationRequest,
};
pub use fcff::{estimate_fcff_base, FcffBase, FcffMethod};
pub use growth::{project_fcff, FcffProjection};
pub use policy::ValuationPolicy;
pub use sensitivity::{sensitivity_grid, SensitivityGrid};
pub use snapshot::{financials_snapshot, FinancialsSnapshot};
pub use valuation::{dcf_valuation, value_firm, DiscountRate, EquityBridge, ValuationResult};
