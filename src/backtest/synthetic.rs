use crate::data::{MarketData, PriceTable};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+0.2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-0.2% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±5% large swings)
    Volatile,
    /// No prices on weekends, like an exchange calendar
    WithGaps,
    /// Calm first half, then a 25% slide
    DrawdownTest,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 6] = [
        Self::Uptrend,
        Self::Downtrend,
        Self::Sideways,
        Self::Volatile,
        Self::WithGaps,
        Self::DrawdownTest,
    ];
}

/// Generates synthetic daily price data for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
        }
    }

    /// Generate daily closes for every ticker
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `tickers` - Instruments to generate, one independent path each
    /// * `start` - First calendar date
    /// * `num_days` - Number of consecutive calendar days
    ///
    /// # Returns
    /// Market data holding the prices and the returns derived from them
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        tickers: &[String],
        start: NaiveDate,
        num_days: usize,
    ) -> MarketData {
        let mut prices = PriceTable::new(tickers.to_vec());

        let paths: Vec<Vec<f64>> = (0..tickers.len())
            .map(|i| {
                let base = self.base_price * (1.0 + 0.1 * i as f64);
                self.generate_path(scenario, base, num_days)
            })
            .collect();

        for day in 0..num_days {
            let Some(date) = start.checked_add_days(Days::new(day as u64)) else {
                break;
            };

            let closed = scenario == MarketScenario::WithGaps
                && matches!(date.weekday(), Weekday::Sat | Weekday::Sun);

            let row = paths
                .iter()
                .map(|path| if closed { None } else { Some(path[day]) })
                .collect();

            // Row width always matches the ticker count
            if let Err(e) = prices.insert_row(date, row) {
                tracing::warn!("Skipping synthetic row for {}: {}", date, e);
            }
        }

        tracing::debug!(
            "Generated {} days of {:?} prices for {} tickers",
            num_days,
            scenario,
            tickers.len()
        );

        MarketData::from_prices(prices)
    }

    fn generate_path(&mut self, scenario: MarketScenario, base: f64, num_days: usize) -> Vec<f64> {
        let mut path = Vec::with_capacity(num_days);
        let mut current_price = base;

        for i in 0..num_days {
            current_price = match scenario {
                MarketScenario::Uptrend => {
                    let noise = self.rng.gen_range(-0.005..0.005);
                    current_price * (1.0 + 0.002 + noise)
                }
                MarketScenario::Downtrend => {
                    let noise = self.rng.gen_range(-0.005..0.005);
                    current_price * (1.0 - 0.002 + noise)
                }
                MarketScenario::Sideways => {
                    // Mean reversion force + noise
                    let reversion = (base - current_price) * 0.1;
                    let noise = current_price * self.rng.gen_range(-0.01..0.01);
                    current_price + reversion + noise
                }
                MarketScenario::Volatile => {
                    let change = current_price * self.rng.gen_range(-0.05..0.05);
                    // Prevent price from going too low
                    (current_price + change).max(base * 0.5)
                }
                MarketScenario::WithGaps => {
                    current_price * (1.0 + self.rng.gen_range(-0.01..0.01))
                }
                MarketScenario::DrawdownTest => {
                    if i < num_days / 2 {
                        current_price * (1.0 + self.rng.gen_range(-0.005..0.01))
                    } else {
                        // -25% spread over the second half
                        let drop_rate = -0.25 / (num_days as f64 / 2.0);
                        let noise = self.rng.gen_range(-0.002..0.002);
                        current_price * (1.0 + drop_rate + noise)
                    }
                }
            };
            path.push(current_price);
        }

        path
    }
}
