use crate::{
    config::Setting,
    thermostat::EngineAction,
    types::{BurnCounters, CalendarDate},
};

#[derive(Debug, Clone, Default)]
pub struct BurnAccountant {
    counters: BurnCounters,
}

impl BurnAccountant {
    pub fn new(counters: BurnCounters) -> Self {
        Self { counters }
    }

    pub fn counters(&self) -> BurnCounters {
        self.counters
    }

    /// Accumulates first, then rolls over, so the tick that crosses midnight
    /// still counts toward the day that just ended.
    pub fn tick(
        &mut self,
        actuator_on: bool,
        date: Option<CalendarDate>,
        actions: &mut Vec<EngineAction>,
    ) {
        let c = &mut self.counters;

        if actuator_on {
            c.total = c.total.saturating_add(1);
            c.today = c.today.saturating_add(1);
            c.this_month = c.this_month.saturating_add(1);
            actions.push(EngineAction::Persist(Setting::BurnTotal(c.total)));
            actions.push(EngineAction::Persist(Setting::BurnToday(c.today)));
            actions.push(EngineAction::Persist(Setting::BurnThisMonth(c.this_month)));
        }

        // Without synced wall time there is nothing to roll over against.
        let Some(date) = date else {
            return;
        };

        if date.day != c.current_day {
            c.yesterday = c.today;
            c.today = 0;
            c.current_day = date.day;
            actions.push(EngineAction::Persist(Setting::BurnYesterday(c.yesterday)));
            actions.push(EngineAction::Persist(Setting::BurnToday(c.today)));
            actions.push(EngineAction::Persist(Setting::BurnDay(c.current_day)));
        }

        if date.month != c.current_month {
            c.prev_month = c.this_month;
            c.this_month = 0;
            c.current_month = date.month;
            actions.push(EngineAction::Persist(Setting::BurnPrevMonth(c.prev_month)));
            actions.push(EngineAction::Persist(Setting::BurnThisMonth(c.this_month)));
            actions.push(EngineAction::Persist(Setting::BurnMonth(c.current_month)));
        }
    }

    /// Zeroes the accumulators; the calendar keys are left alone.
    pub fn reset(&mut self, actions: &mut Vec<EngineAction>) {
        let c = &mut self.counters;
        c.total = 0;
        c.today = 0;
        c.yesterday = 0;
        c.this_month = 0;
        c.prev_month = 0;

        actions.extend(
            [
                Setting::BurnTotal(0),
                Setting::BurnToday(0),
                Setting::BurnYesterday(0),
                Setting::BurnThisMonth(0),
                Setting::BurnPrevMonth(0),
            ]
            .into_iter()
            .map(EngineAction::Persist),
        );
    }
}
