//! `<time.h>` on top of chrono. Calendar values travel as instances of the
//! host class `tm`, whose fields scripts read and write directly.

use crate::error::BindingError;
use crate::heap::ObjectRef;
use crate::library::{HostClass, HostContext, Library};
use crate::types::Type;
use crate::value::Value;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use std::fmt::Write;

pub const CLOCKS_PER_SEC: i64 = 1_000_000;

const TM_FIELDS: [&str; 9] = [
    "tm_sec", "tm_min", "tm_hour", "tm_mday", "tm_mon", "tm_year", "tm_wday", "tm_yday",
    "tm_isdst",
];

fn tm_class() -> Result<HostClass, BindingError> {
    TM_FIELDS
        .iter()
        .try_fold(HostClass::new("tm"), |class, field| {
            class.field(&format!("int {}", field))
        })
}

fn to_tm<Tz: TimeZone>(context: &HostContext, moment: &DateTime<Tz>) -> Result<Value, BindingError> {
    let tm = context.new_instance("tm", None)?;
    let values = [
        moment.second() as i64,
        moment.minute() as i64,
        moment.hour() as i64,
        moment.day() as i64,
        moment.month0() as i64,
        moment.year() as i64 - 1900,
        moment.weekday().num_days_from_sunday() as i64,
        moment.ordinal0() as i64,
        0,
    ];
    for (field, value) in TM_FIELDS.iter().zip(values) {
        context.set_field(&tm, field, Value::Int(value))?;
    }
    Ok(Value::Object(tm))
}

/// Normalise a `tm` the way `mktime` does: out-of-range fields carry.
fn from_tm(context: &HostContext, tm: &ObjectRef) -> Result<Option<NaiveDateTime>, BindingError> {
    let field = |name: &str| -> Result<i64, BindingError> {
        context
            .get_field(tm, name)?
            .as_int()
            .ok_or_else(|| BindingError::Host(format!("tm.{} is not an integer", name)))
    };
    let month = field("tm_mon")?;
    let year = field("tm_year")? + 1900 + month.div_euclid(12);
    let (day, hour, minute, second) = (
        field("tm_mday")?,
        field("tm_hour")?,
        field("tm_min")?,
        field("tm_sec")?,
    );
    let seconds = (day - 1)
        .checked_mul(86_400)
        .and_then(|s| s.checked_add(hour.checked_mul(3_600)?))
        .and_then(|s| s.checked_add(minute.checked_mul(60)?))
        .and_then(|s| s.checked_add(second));
    let (Ok(year), Some(seconds)) = (i32::try_from(year), seconds) else {
        return Ok(None);
    };
    if seconds.abs() > i64::MAX / 1_000 {
        return Ok(None);
    }
    Ok(
        NaiveDate::from_ymd_opt(year, month.rem_euclid(12) as u32 + 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .and_then(|start| start.checked_add_signed(chrono::Duration::seconds(seconds))),
    )
}

fn local(timestamp: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(timestamp, 0).single()
}

fn strftime<Tz: TimeZone>(format: &str, moment: &DateTime<Tz>) -> Result<String, BindingError>
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    write!(out, "{}", moment.format(format))
        .map_err(|_| BindingError::Host(format!("strftime: invalid format '{}'", format)))?;
    Ok(out)
}

const ASCTIME: &str = "%a %b %e %H:%M:%S %Y\n";

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    library.constant("CLOCKS_PER_SEC", Type::Int, CLOCKS_PER_SEC)?;
    library.class(tm_class()?)?;

    // The pointer argument is accepted for `time(NULL)` and ignored.
    library.function("long time(void *)", |_, _| Ok(Value::Int(Utc::now().timestamp())))?;
    library.function("long clock()", |context, _| {
        Ok(Value::Int(context.elapsed().as_micros() as i64))
    })?;
    library.function("double difftime(long, long)", |_, args| {
        Ok(Value::Float((args.int(0)? - args.int(1)?) as f64))
    })?;
    library.function("string ctime(long)", |_, args| {
        let moment = local(args.int(0)?)
            .ok_or_else(|| BindingError::Host("ctime: time out of range".into()))?;
        Ok(Value::string(strftime(ASCTIME, &moment)?))
    })?;
    library.function("tm gmtime(long)", |context, args| {
        match Utc.timestamp_opt(args.int(0)?, 0).single() {
            Some(moment) => to_tm(context, &moment),
            None => Ok(Value::Null),
        }
    })?;
    library.function("tm localtime(long)", |context, args| match local(args.int(0)?) {
        Some(moment) => to_tm(context, &moment),
        None => Ok(Value::Null),
    })?;
    library.function("long mktime(tm)", |context, args| {
        let tm = args.object(0)?;
        let moment = from_tm(context, &tm)?.and_then(|naive| Local.from_local_datetime(&naive).earliest());
        Ok(Value::Int(match moment {
            Some(moment) => {
                // mktime writes the normalised calendar back.
                if let Value::Object(normalised) = to_tm(context, &moment)? {
                    for field in TM_FIELDS {
                        let value = context.get_field(&normalised, field)?;
                        context.set_field(&tm, field, value)?;
                    }
                }
                moment.timestamp()
            }
            None => -1,
        }))
    })?;
    library.function("string asctime(tm)", |context, args| {
        let naive = from_tm(context, &args.object(0)?)?
            .ok_or_else(|| BindingError::Host("asctime: time out of range".into()))?;
        Ok(Value::string(strftime(ASCTIME, &Utc.from_utc_datetime(&naive))?))
    })?;
    library.function("string strftime(string, tm)", |context, args| {
        let naive = from_tm(context, &args.object(1)?)?
            .ok_or_else(|| BindingError::Host("strftime: time out of range".into()))?;
        Ok(Value::string(strftime(&args.string(0)?, &Utc.from_utc_datetime(&naive))?))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::stdlib::testing::Harness;

    fn field(tm: &Value, name: &str) -> i64 {
        let object = tm.as_object().unwrap().borrow();
        let instance = object.as_instance().unwrap();
        let slot = instance.class.field_slot(name).unwrap();
        instance.fields[slot].as_int().unwrap()
    }

    #[test]
    fn test_gmtime_breaks_down_a_timestamp() {
        let mut h = Harness::new();
        // 2000-03-01 12:34:56 UTC, a Wednesday.
        let tm = h.call("gmtime", vec![Value::Int(951_914_096)]);
        assert_eq!(field(&tm, "tm_year"), 100);
        assert_eq!(field(&tm, "tm_mon"), 2);
        assert_eq!(field(&tm, "tm_mday"), 1);
        assert_eq!(field(&tm, "tm_hour"), 12);
        assert_eq!(field(&tm, "tm_min"), 34);
        assert_eq!(field(&tm, "tm_sec"), 56);
        assert_eq!(field(&tm, "tm_wday"), 3);
        assert_eq!(field(&tm, "tm_yday"), 60);
        assert_eq!(
            h.call("asctime", vec![tm.clone()]),
            Value::string("Wed Mar  1 12:34:56 2000\n")
        );
        assert_eq!(
            h.call("strftime", vec![Value::string("%Y-%m-%d"), tm]),
            Value::string("2000-03-01")
        );
    }

    #[test]
    fn test_mktime_round_trips_localtime_and_normalises() {
        let mut h = Harness::new();
        let tm = h.call("localtime", vec![Value::Int(1_000_000_000)]);
        assert_eq!(h.call("mktime", vec![tm.clone()]), Value::Int(1_000_000_000));

        let tm = h.call("localtime", vec![Value::Int(1_000_000_000)]);
        let seconds = field(&tm, "tm_sec");
        {
            let object = tm.as_object().unwrap();
            let mut object = object.borrow_mut();
            let instance = object.as_instance_mut().unwrap();
            let slot = instance.class.field_slot("tm_sec").unwrap();
            instance.fields[slot] = Value::Int(seconds + 60);
        }
        assert_eq!(h.call("mktime", vec![tm.clone()]), Value::Int(1_000_000_060));
        assert_eq!(field(&tm, "tm_sec"), seconds);
    }

    #[test]
    fn test_clock_and_difftime() {
        let mut h = Harness::new();
        assert!(h.call("clock", vec![]).as_int().unwrap() >= 0);
        assert_eq!(
            h.call("difftime", vec![Value::Int(10), Value::Int(4)]),
            Value::Float(6.0)
        );
        let now = h.call("time", vec![Value::Null]).as_int().unwrap();
        assert!(now > 1_600_000_000);
    }
}
