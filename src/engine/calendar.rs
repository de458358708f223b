// ==========================================
// 车间生产排产系统 - 工作日历
// ==========================================
// 职责: 工作日结构（上午/午休/下午/加班上限）与日期算术
// 红线: 纯函数，无副作用；所有边界来自显式配置，
//       禁止模块级硬编码边界常量（加班判定与分配使用同一 day_end）
// ==========================================

use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// CalendarConfig - 工作日边界配置
// ==========================================
// 四个常规边界 + 可选加班上限，随调用显式传递
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub morning_start: NaiveTime,        // 早班开始
    pub lunch_start: NaiveTime,          // 午休开始
    pub lunch_end: NaiveTime,            // 午休结束
    pub day_end: NaiveTime,              // 常规下班
    pub max_overtime_minutes: Option<i64>, // 加班上限（分钟，None 表示不允许加班）
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            morning_start: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            lunch_start: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            lunch_end: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            day_end: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            max_overtime_minutes: Some(120),
        }
    }
}

impl CalendarConfig {
    /// 加班时段结束时刻（day_end + 加班上限）
    pub fn overtime_end(&self) -> Option<NaiveTime> {
        self.max_overtime_minutes
            .map(|m| self.day_end + Duration::minutes(m))
    }

    /// 单个常规工作日的可用分钟数（扣除午休）
    pub fn regular_minutes_per_day(&self) -> i64 {
        let total = (self.day_end - self.morning_start).num_minutes();
        let lunch = (self.lunch_end - self.lunch_start).num_minutes();
        total - lunch
    }
}

// ==========================================
// WorkWindow - 当前游标可消耗的连续时段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkWindow {
    pub start: NaiveTime,   // 窗口起点（已跳过午休）
    pub end: NaiveTime,     // 窗口终点（午休开始/下班/加班上限之一）
    pub is_overtime: bool,  // 是否为加班窗口
}

impl WorkWindow {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// 窗口秒数——产能消耗按秒计量，
    /// 分钟截断会把亚分钟零头算成零长窗口
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

// ==========================================
// WorkCalendar - 工作日历
// ==========================================
#[derive(Debug, Clone)]
pub struct WorkCalendar {
    config: CalendarConfig,
}

impl WorkCalendar {
    pub fn new(config: CalendarConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    // ==========================================
    // 时刻算术
    // ==========================================

    /// 解析 "HH:MM" 为当日相对分钟数
    ///
    /// 格式错误属调用方契约违反，直接返回错误不做修补
    pub fn parse_clock_minutes(s: &str) -> Result<i64> {
        let t = NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|e| anyhow!("非法时刻格式 '{}': {}", s, e))?;
        Ok(Self::time_to_minutes(t))
    }

    /// 当日相对分钟数转 "HH:MM"
    pub fn format_clock_minutes(minutes: i64) -> String {
        format!("{:02}:{:02}", minutes / 60, minutes % 60)
    }

    /// NaiveTime 转当日相对分钟数
    pub fn time_to_minutes(t: NaiveTime) -> i64 {
        (t - NaiveTime::from_hms_opt(0, 0, 0).unwrap()).num_minutes()
    }

    /// 当日相对分钟数转 NaiveTime
    pub fn minutes_to_time(minutes: i64) -> NaiveTime {
        NaiveTime::from_hms_opt(0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    // ==========================================
    // 日期算术
    // ==========================================

    /// 判断是否为工作日（周一至周五）
    pub fn is_workday(date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 下一个工作日（跳过周六/周日）
    pub fn next_workday(date: NaiveDate) -> NaiveDate {
        let mut d = date + Duration::days(1);
        while !Self::is_workday(d) {
            d = d + Duration::days(1);
        }
        d
    }

    /// 若给定日期落在周末则推进到下一个工作日，否则原样返回
    ///
    /// 起始日期与溢出日期均须跳过周末
    pub fn align_to_workday(date: NaiveDate) -> NaiveDate {
        let mut d = date;
        while !Self::is_workday(d) {
            d = d + Duration::days(1);
        }
        d
    }

    // ==========================================
    // 窗口判定
    // ==========================================

    /// 从游标时刻确定当前可消耗的连续时段
    ///
    /// 规则:
    /// - 游标早于早班开始 → 从早班开始计
    /// - 游标落在午休内 → 从午休结束计
    /// - 午休前 → 窗口止于午休开始
    /// - 下班前 → 窗口止于常规下班
    /// - 已到/过下班且允许加班 → 窗口止于加班上限
    /// - 其余情况当日无剩余产能，返回 None（调用方滚动到次日早班）
    pub fn window_from(&self, cursor: NaiveTime, allow_overtime: bool) -> Option<WorkWindow> {
        let c = &self.config;

        // 规整游标：早于早班从早班算起，午休内跳到午休结束
        let cursor = if cursor < c.morning_start {
            c.morning_start
        } else if cursor >= c.lunch_start && cursor < c.lunch_end {
            c.lunch_end
        } else {
            cursor
        };

        if cursor < c.lunch_start {
            return Some(WorkWindow {
                start: cursor,
                end: c.lunch_start,
                is_overtime: false,
            });
        }

        if cursor < c.day_end {
            return Some(WorkWindow {
                start: cursor,
                end: c.day_end,
                is_overtime: false,
            });
        }

        if allow_overtime {
            if let Some(ot_end) = c.overtime_end() {
                if cursor < ot_end {
                    return Some(WorkWindow {
                        start: cursor,
                        end: ot_end,
                        is_overtime: true,
                    });
                }
            }
        }

        None
    }

    /// 消耗时段后的游标规整：恰好落在午休开始则跳到午休结束
    pub fn normalize_cursor(&self, cursor: NaiveTime) -> NaiveTime {
        if cursor == self.config.lunch_start {
            self.config.lunch_end
        } else {
            cursor
        }
    }
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::new(CalendarConfig::default())
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_clock_minutes_roundtrip() {
        assert_eq!(WorkCalendar::parse_clock_minutes("07:00").unwrap(), 420);
        assert_eq!(WorkCalendar::parse_clock_minutes("15:30").unwrap(), 930);
        assert_eq!(WorkCalendar::format_clock_minutes(930), "15:30");
        assert_eq!(WorkCalendar::format_clock_minutes(420), "07:00");

        // 格式错误为调用方契约违反
        assert!(WorkCalendar::parse_clock_minutes("25:99").is_err());
        assert!(WorkCalendar::parse_clock_minutes("abc").is_err());
    }

    #[test]
    fn test_weekend_skipping() {
        // 2026-03-06 是周五
        let fri = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        let sat = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let mon = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();

        assert_eq!(WorkCalendar::next_workday(fri), mon);
        assert_eq!(WorkCalendar::align_to_workday(sat), mon);
        assert_eq!(WorkCalendar::align_to_workday(mon), mon);
    }

    #[test]
    fn test_window_morning_and_afternoon() {
        let cal = WorkCalendar::default();

        // 上午窗口止于午休开始
        let w = cal.window_from(t(7, 0), false).unwrap();
        assert_eq!(w.end, t(12, 0));
        assert_eq!(w.minutes(), 300);
        assert!(!w.is_overtime);

        // 午休内从午休结束计
        let w = cal.window_from(t(12, 10), false).unwrap();
        assert_eq!(w.start, t(12, 30));
        assert_eq!(w.end, t(15, 30));

        // 下午窗口止于常规下班
        let w = cal.window_from(t(13, 0), false).unwrap();
        assert_eq!(w.end, t(15, 30));
        assert_eq!(w.minutes(), 150);
    }

    #[test]
    fn test_window_seconds_counts_subminute_remainder() {
        let cal = WorkCalendar::default();

        // 午休前 40 秒零头: 分钟截断为 0，秒计量保留
        let cursor = NaiveTime::from_hms_opt(11, 59, 20).unwrap();
        let w = cal.window_from(cursor, false).unwrap();
        assert_eq!(w.end, t(12, 0));
        assert_eq!(w.minutes(), 0);
        assert_eq!(w.seconds(), 40);
    }

    #[test]
    fn test_window_overtime() {
        let cal = WorkCalendar::default();

        // 不允许加班时下班后无窗口
        assert!(cal.window_from(t(15, 30), false).is_none());

        // 允许加班时窗口止于加班上限（15:30 + 120min = 17:30）
        let w = cal.window_from(t(15, 30), true).unwrap();
        assert_eq!(w.end, t(17, 30));
        assert!(w.is_overtime);

        // 加班上限已到则无窗口
        assert!(cal.window_from(t(17, 30), true).is_none());
    }

    #[test]
    fn test_window_without_overtime_ceiling() {
        let cal = WorkCalendar::new(CalendarConfig {
            max_overtime_minutes: None,
            ..CalendarConfig::default()
        });
        // 未配置加班上限时即使允许加班也无加班窗口
        assert!(cal.window_from(t(15, 30), true).is_none());
    }

    #[test]
    fn test_normalize_cursor_lunch_boundary() {
        let cal = WorkCalendar::default();
        assert_eq!(cal.normalize_cursor(t(12, 0)), t(12, 30));
        assert_eq!(cal.normalize_cursor(t(11, 59)), t(11, 59));
    }

    #[test]
    fn test_regular_minutes_per_day() {
        // 07:00-15:30 扣除 30 分钟午休 = 480 分钟
        assert_eq!(CalendarConfig::default().regular_minutes_per_day(), 480);
    }
}
