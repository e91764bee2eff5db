use crate::utils::BitField;
use std::{ops::RangeInclusive, time::SystemTime};

/// Years the 7-bit date field can hold.
const YEARS: RangeInclusive<u16> = 1980..=2107;

/// A FAT modification stamp: a time word and a date word.
///
/// time: `[0..5)` seconds / 2, `[5..11)` minute, `[11..16)` hour
/// date: `[0..5)` day, `[5..9)` month, `[9..16)` years since 1980
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FatTimestamp {
    pub time: u16,
    pub date: u16,
}

impl FatTimestamp {
    /// Years outside 1980..=2107 do not fit the date word and are truncated.
    pub fn from_calendar(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let time = 0u16
            .with_bits(0..5, (second / 2) as u16)
            .with_bits(5..11, minute as u16)
            .with_bits(11..16, hour as u16);
        let date = 0u16
            .with_bits(0..5, day as u16)
            .with_bits(5..9, month as u16)
            .with_bits(9..16, year.wrapping_sub(1980));
        Self { time, date }
    }

    /// Local calendar time of `time`, or the all-zero stamp if the platform
    /// cannot convert it or the year does not fit the date word.
    pub fn from_system_time(time: SystemTime) -> Self {
        local_calendar(time)
            .filter(|&(year, ..)| YEARS.contains(&year))
            .map(|(year, month, day, hour, minute, second)| {
                Self::from_calendar(year, month, day, hour, minute, second)
            })
            .unwrap_or_default()
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Time word in the low half, date word in the high half.
    #[inline]
    pub fn packed(&self) -> u32 {
        (self.date as u32) << 16 | self.time as u32
    }

    pub fn year(&self) -> u16 {
        self.date.get_bits(9..16) + 1980
    }

    pub fn month(&self) -> u8 {
        self.date.get_bits(5..9) as u8
    }

    pub fn day(&self) -> u8 {
        self.date.get_bits(0..5) as u8
    }

    pub fn hour(&self) -> u8 {
        self.time.get_bits(11..16) as u8
    }

    pub fn minute(&self) -> u8 {
        self.time.get_bits(5..11) as u8
    }

    pub fn second(&self) -> u8 {
        self.time.get_bits(0..5) as u8 * 2
    }
}

impl std::fmt::Display for FatTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

type Calendar = (u16, u8, u8, u8, u8, u8);

#[cfg(unix)]
fn local_calendar(time: SystemTime) -> Option<Calendar> {
    let secs = time.duration_since(SystemTime::UNIX_EPOCH).ok()?.as_secs();
    let secs = libc::time_t::try_from(secs).ok()?;

    // safety: `tm` is plain data and localtime_r only writes through the
    // pointers we hand it
    let tm = unsafe {
        let mut tm: libc::tm = std::mem::zeroed();
        if libc::localtime_r(&secs, &mut tm).is_null() {
            return None;
        }
        tm
    };

    Some((
        u16::try_from(tm.tm_year + 1900).ok()?,
        u8::try_from(tm.tm_mon + 1).ok()?,
        u8::try_from(tm.tm_mday).ok()?,
        u8::try_from(tm.tm_hour).ok()?,
        u8::try_from(tm.tm_min).ok()?,
        u8::try_from(tm.tm_sec).ok()?,
    ))
}

#[cfg(not(unix))]
fn local_calendar(_time: SystemTime) -> Option<Calendar> {
    None
}
