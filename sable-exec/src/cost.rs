//! Saturating cost arithmetic for the access planner.

use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use tracing::warn;

use crate::config::ExecConfig;

/// A non-negative double with an explicit infinity, saturating on overflow.
#[derive(Debug, Clone, Copy)]
pub struct CostValue {
    infinity: bool,
    value: f64,
}

impl Default for CostValue {
    fn default() -> Self {
        Self::INFINITY
    }
}

impl CostValue {
    /// The infinite cost.
    pub const INFINITY: CostValue = CostValue {
        infinity: true,
        value: 0.0,
    };

    /// Zero cost.
    pub const ZERO: CostValue = CostValue {
        infinity: false,
        value: 0.0,
    };

    /// Builds a finite value; negatives clamp to zero.
    pub fn new(value: f64) -> Self {
        CostValue {
            infinity: false,
            value: if value > 0.0 { value } else { 0.0 },
        }
    }

    /// Whether this is the infinite cost.
    pub const fn is_infinity(&self) -> bool {
        self.infinity
    }

    /// The finite value, or `None` for infinity.
    pub fn to_f64(&self) -> Option<f64> {
        (!self.infinity).then_some(self.value)
    }

    /// Clamping integer form; infinity maps to `i32::MAX`.
    pub fn as_int(&self) -> i32 {
        if self.infinity || self.value > i32::MAX as f64 {
            i32::MAX
        } else {
            self.value as i32
        }
    }

    /// Natural logarithm with +1 smoothing, so a count of zero or one costs
    /// nothing and small counts stay positive. Planner orderings were tuned
    /// against this curve; changing it shifts plan choices.
    pub fn log(&self) -> CostValue {
        if self.infinity {
            return CostValue::INFINITY;
        }
        CostValue::new((self.value + 1.0).ln())
    }
}

impl From<f64> for CostValue {
    fn from(v: f64) -> Self {
        CostValue::new(v)
    }
}

impl AddAssign<f64> for CostValue {
    fn add_assign(&mut self, rhs: f64) {
        if !self.infinity {
            if f64::MAX - rhs <= self.value {
                self.infinity = true;
            } else {
                self.value += rhs;
            }
        }
    }
}

impl SubAssign<f64> for CostValue {
    fn sub_assign(&mut self, rhs: f64) {
        if !self.infinity {
            if self.value < rhs {
                self.value = 0.0;
            } else {
                self.value -= rhs;
            }
        }
    }
}

impl MulAssign<f64> for CostValue {
    fn mul_assign(&mut self, rhs: f64) {
        if !self.infinity {
            if rhs > 1.0 && f64::MAX / rhs <= self.value {
                self.infinity = true;
            } else {
                self.value *= rhs;
            }
        }
    }
}

impl DivAssign<f64> for CostValue {
    fn div_assign(&mut self, rhs: f64) {
        if !self.infinity && self.value != 0.0 {
            if rhs < 1.0 && f64::MAX * rhs <= self.value {
                warn!("cost value divided by zero");
                self.infinity = true;
            } else {
                self.value /= rhs;
            }
        }
    }
}

macro_rules! forward_value_ops {
    ($($assign:ident :: $assign_fn:ident, $op:ident :: $op_fn:ident),* $(,)?) => {
        $(
            impl $assign<CostValue> for CostValue {
                fn $assign_fn(&mut self, rhs: CostValue) {
                    if rhs.infinity {
                        self.infinity = true;
                    } else {
                        self.$assign_fn(rhs.value);
                    }
                }
            }

            impl $op<CostValue> for CostValue {
                type Output = CostValue;
                fn $op_fn(mut self, rhs: CostValue) -> CostValue {
                    self.$assign_fn(rhs);
                    self
                }
            }

            impl $op<f64> for CostValue {
                type Output = CostValue;
                fn $op_fn(mut self, rhs: f64) -> CostValue {
                    self.$assign_fn(rhs);
                    self
                }
            }
        )*
    };
}

forward_value_ops!(
    AddAssign::add_assign, Add::add,
    SubAssign::sub_assign, Sub::sub,
    MulAssign::mul_assign, Mul::mul,
    DivAssign::div_assign, Div::div,
);

impl PartialEq for CostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.infinity, other.infinity) {
            (true, true) => true,
            (false, false) => self.value == other.value,
            _ => false,
        }
    }
}

impl PartialEq<f64> for CostValue {
    fn eq(&self, other: &f64) -> bool {
        !self.infinity && self.value == *other
    }
}

impl PartialOrd for CostValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(match (self.infinity, other.infinity) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.value.partial_cmp(&other.value)?,
        })
    }
}

impl fmt::Display for CostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.infinity {
            f.write_str("inf")
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// The planner's cost aggregate for one plan candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    overhead: CostValue,
    startup: CostValue,
    total: CostValue,
    tuple_count: CostValue,
    tuple_size: CostValue,
    retrieve: CostValue,
    limit_count: CostValue,
    rate: CostValue,
    fetch: bool,
    rate_set: bool,
    count_set: bool,
}

impl Default for Cost {
    fn default() -> Self {
        Cost {
            overhead: CostValue::ZERO,
            startup: CostValue::ZERO,
            total: CostValue::ZERO,
            tuple_count: CostValue::ZERO,
            tuple_size: CostValue::ZERO,
            retrieve: CostValue::ZERO,
            limit_count: CostValue::INFINITY,
            rate: CostValue::INFINITY,
            fetch: false,
            rate_set: false,
            count_set: false,
        }
    }
}

impl Cost {
    /// A zeroed cost.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed per-plan overhead.
    pub fn set_overhead(&mut self, v: CostValue) -> &mut Self {
        self.overhead = v;
        self
    }

    /// One-time startup cost.
    pub fn set_startup(&mut self, v: CostValue) -> &mut Self {
        self.startup = v;
        self
    }

    /// Total processing cost over all tuples.
    pub fn set_total_cost(&mut self, v: CostValue) -> &mut Self {
        self.total = v;
        self
    }

    /// Expected tuple count.
    pub fn set_tuple_count(&mut self, v: CostValue) -> &mut Self {
        self.tuple_count = v;
        self.count_set = true;
        self
    }

    /// Expected tuple byte size.
    pub fn set_tuple_size(&mut self, v: CostValue) -> &mut Self {
        self.tuple_size = v;
        self
    }

    /// Per-tuple retrieval cost.
    pub fn set_retrieve_cost(&mut self, v: CostValue) -> &mut Self {
        self.retrieve = v;
        self
    }

    /// Selectivity of the plan.
    pub fn set_rate(&mut self, v: CostValue) -> &mut Self {
        self.rate = v;
        self.rate_set = true;
        self
    }

    /// LIMIT pushed into the plan; scaled up by the inverse rate.
    pub fn set_limit_count(&mut self, v: CostValue) -> &mut Self {
        if self.rate.is_infinity() || self.rate == 0.0 {
            self.limit_count = v;
        } else {
            self.limit_count = v / self.rate;
        }
        self
    }

    /// Marks the plan as fetching rows one by one.
    pub fn set_fetch(&mut self, fetch: bool) -> &mut Self {
        self.fetch = fetch;
        self
    }

    /// Whether the plan fetches rows one by one.
    pub fn is_fetch(&self) -> bool {
        self.fetch
    }

    /// Whether a tuple count was provided.
    pub fn is_count_set(&self) -> bool {
        self.count_set
    }

    /// Whether a selectivity was provided.
    pub fn is_rate_set(&self) -> bool {
        self.rate_set
    }

    /// Expected tuple count.
    pub fn tuple_count(&self) -> CostValue {
        self.tuple_count
    }

    /// LIMIT-bounded tuple count.
    pub fn limit_count(&self) -> CostValue {
        self.limit_count
    }

    /// Rows the plan actually produces: limit-bounded tuple count.
    pub fn result_count(&self) -> CostValue {
        if self.limit_count < self.tuple_count {
            self.limit_count
        } else {
            self.tuple_count
        }
    }

    /// Processing cost of one tuple.
    pub fn process_cost(&self) -> CostValue {
        if self.count_set && self.tuple_count > CostValue::ZERO {
            self.total / self.tuple_count
        } else {
            self.total
        }
    }

    /// Cost of one full scan, as repeated under a join.
    pub fn repeat_cost(&self) -> CostValue {
        if self.count_set && self.result_count() > CostValue::ZERO {
            self.startup + (self.process_cost() + self.retrieve) * self.result_count()
        } else {
            self.startup + self.process_cost() + self.retrieve
        }
    }

    /// The comparable total: overhead plus repeat cost.
    pub fn calculate(&self) -> CostValue {
        self.overhead + self.repeat_cost()
    }

    /// Adds the n·log(n) penalty of sorting the produced rows, switching from
    /// memory to file bandwidth above the collection threshold.
    pub fn add_sorting_cost(&mut self, config: &ExecConfig) {
        if self.tuple_count > CostValue::new(1.0) {
            let mut speed = config.memory_transfer_speed;
            let count = if self.tuple_count < self.limit_count {
                self.tuple_count
            } else {
                self.limit_count
            };
            self.startup += self.process_cost() * count;
            if self.retrieve > CostValue::ZERO {
                self.startup += self.retrieve * count;
            }
            let total_size = count * self.tuple_size;
            if total_size > CostValue::new(config.collection_threshold) {
                speed = config.file_transfer_speed;
            }
            self.startup += (self.tuple_size / speed) * count * count.log();
        }
    }

    /// Widens the effective limit for DISTINCT processing.
    pub fn add_distinct_cost(&mut self) {
        self.limit_count *= 100.0;
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.calculate().partial_cmp(&other.calculate())
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cost({})[overhead={} cost={} count={} size={} limit={} startup={} retrieve={} rate={}]",
            self.calculate(),
            self.overhead,
            self.process_cost(),
            self.tuple_count,
            self.tuple_size,
            self.limit_count,
            self.startup,
            self.retrieve,
            self.rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation() {
        let huge = CostValue::new(f64::MAX / 2.0);
        assert!((huge + huge).is_infinity());
        assert!((huge * 4.0).is_infinity());
        assert!(!(huge - f64::MAX).is_infinity());
        assert_eq!(CostValue::new(3.0) - 5.0, CostValue::ZERO);
    }

    #[test]
    fn division_by_zero_saturates() {
        assert!((CostValue::new(1.0) / 0.0).is_infinity());
        assert_eq!(CostValue::ZERO / 0.0, CostValue::ZERO);
    }

    #[test]
    fn infinity_is_the_maximum() {
        assert!(CostValue::INFINITY > CostValue::new(f64::MAX / 2.0));
        assert_eq!(CostValue::INFINITY, CostValue::INFINITY);
    }

    #[test]
    fn log_smoothing_keeps_zero_at_zero() {
        assert_eq!(CostValue::ZERO.log(), CostValue::ZERO);
        assert!(CostValue::new(100.0).log() > CostValue::ZERO);
        assert!(CostValue::INFINITY.log().is_infinity());
    }

    #[test]
    fn calculate_combines_startup_and_per_tuple_cost() {
        let mut cost = Cost::new();
        cost.set_overhead(CostValue::new(10.0))
            .set_startup(CostValue::new(5.0))
            .set_total_cost(CostValue::new(100.0))
            .set_tuple_count(CostValue::new(10.0))
            .set_retrieve_cost(CostValue::new(1.0));
        // 10 + 5 + (100/10 + 1) * 10
        assert_eq!(cost.calculate(), CostValue::new(125.0));
    }

    #[test]
    fn limit_bounds_result_count() {
        let mut cost = Cost::new();
        cost.set_total_cost(CostValue::new(100.0))
            .set_tuple_count(CostValue::new(100.0))
            .set_limit_count(CostValue::new(7.0));
        assert_eq!(cost.result_count(), CostValue::new(7.0));
    }

    #[test]
    fn distinct_widens_limit() {
        let mut cost = Cost::new();
        cost.set_limit_count(CostValue::new(2.0));
        cost.add_distinct_cost();
        assert_eq!(cost.limit_count(), CostValue::new(200.0));
    }

    #[test]
    fn sorting_cost_increases_startup() {
        let config = ExecConfig::default();
        let mut sorted = Cost::new();
        sorted
            .set_total_cost(CostValue::new(100.0))
            .set_tuple_count(CostValue::new(1000.0))
            .set_tuple_size(CostValue::new(64.0));
        let plain = sorted.calculate();
        sorted.add_sorting_cost(&config);
        assert!(sorted.calculate() > plain);
    }
}
