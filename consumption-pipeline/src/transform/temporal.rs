use consumption_domain::domain::{CalendarFields, CleanReading, DecoratedReading};
use time::PrimitiveDateTime;

/// Calendar fields of an instant, read from its wall clock as-is.
pub fn calendar_fields(instant: PrimitiveDateTime) -> CalendarFields {
    CalendarFields {
        date: instant.date(),
        hour: instant.hour(),
        year: instant.year(),
        month: u8::from(instant.month()),
    }
}

pub fn decompose(reading: CleanReading) -> DecoratedReading {
    let calendar = calendar_fields(reading.instant);
    DecoratedReading { reading, calendar }
}
