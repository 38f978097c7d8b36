use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// 时钟端口，业务代码不直接读取系统时间
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn days_from_today(&self, days: i64) -> NaiveDate {
        self.today() + Duration::days(days)
    }
}

/// 某日 00:00 UTC
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
