//! # DS3231 Driver
//!
//! This is a driver for the Maxim Integrated DS3231 real-time clock.
//!
//! Specifically, this driver is for reading and setting the time-keeping
//! registers in the DS3231 over I²C - this driver does not handle the alarms,
//! the square-wave output, the aging offset or the temperature sensor.
//!
//! The DS3231 keeps the time in seven consecutive registers, starting at
//! register `0x00`:
//!
//! * Seconds
//! * Minutes
//! * Hours (in either 12-hour or 24-hour format)
//! * Day of the week (1 to 7)
//! * Day of the month (1 to 31)
//! * Month (1 to 12), plus a century flag
//! * Year (two digits, 00 to 99)
//!
//! Every register is packed binary-coded-decimal. The [`RegisterImage`] type
//! converts between those seven bytes and a [`CivilTime`], and the [`Ds3231`]
//! object moves a [`RegisterImage`] over the I²C bus.
//!
//! The [`CivilTime`] fields follow the usual broken-down calendar time
//! conventions: weekdays count from Sunday = 0, months count from January = 0
//! and years count from 1900. The DS3231 only stores a two-digit year, so only
//! the years 2000 to 2099 can be represented.
//!
//! The DS3231 has no concept of time zones or daylight saving. We suggest you
//! keep the clock in UTC and apply any local adjustment after reading it back.
//!
//! # Example
//!
//! You might set and read back the clock like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, _address: SevenBitAddress, _bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, _address: SevenBitAddress, _bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.copy_from_slice(&[0x00, 0x23, 0x01, 0x01, 0x09, 0x05, 0x22]);
//! #         Ok(())
//! #     }
//! # }
//! # let mut i2c = I2c;
//! let rtc = ds3231::Ds3231::new();
//! // 9th May 2022, 01:23:00, a Monday
//! let time = ds3231::CivilTime {
//!     seconds: 0,
//!     minutes: 23,
//!     hours: 1,
//!     weekday: 1,
//!     day_of_month: 9,
//!     month: 4,
//!     year: 122,
//!     daylight_saving: ds3231::DaylightSaving::Unspecified,
//! };
//! if let Err(e) = rtc.set_time(&mut i2c, &time) {
//!     // RTC didn't respond, or the time was out of range
//! }
//! match rtc.get_time(&mut i2c) {
//!     Ok(now) => assert_eq!(now.minutes, 23),
//!     Err(_e) => {
//!         // RTC didn't respond, or sent back garbage
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]

//
// Public Types
//

/// Whether daylight saving time is in effect for a [`CivilTime`].
///
/// The DS3231 does not store this, so anything read back from the chip is
/// always [`DaylightSaving::Unspecified`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DaylightSaving {
    /// Nobody knows
    #[default]
    Unspecified,
    /// Daylight saving time is in effect
    InEffect,
    /// Daylight saving time is not in effect
    NotInEffect,
}

/// A broken-down calendar time, as stored in the DS3231.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CivilTime {
    /// Seconds after the minute, 0 to 59
    pub seconds: u8,
    /// Minutes after the hour, 0 to 59
    pub minutes: u8,
    /// Hours since midnight, 0 to 23
    pub hours: u8,
    /// Days since Sunday, 0 to 6
    pub weekday: u8,
    /// Day of the month, 1 to 31
    pub day_of_month: u8,
    /// Months since January, 0 to 11
    pub month: u8,
    /// Years since 1900. Must be 100 to 199 to fit in the DS3231.
    pub year: u16,
    /// Daylight saving marker. Never sent to the chip.
    pub daylight_saving: DaylightSaving,
}

/// The seven time-keeping registers of the DS3231, exactly as they appear on
/// the wire.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RegisterImage([u8; TIME_REGISTER_COUNT]);

/// The time-keeping registers in the DS3231, by address.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    /// Seconds, BCD 00 to 59
    Seconds = 0x00,
    /// Minutes, BCD 00 to 59
    Minutes = 0x01,
    /// Hours, with the 12/24 and AM/PM flags
    Hours = 0x02,
    /// Day of the week, BCD 1 to 7
    Weekday = 0x03,
    /// Day of the month, BCD 01 to 31
    DayOfMonth = 0x04,
    /// Month, BCD 01 to 12, with the century flag
    Month = 0x05,
    /// Year, BCD 00 to 99
    Year = 0x06,
}

/// Identifies one field of a [`CivilTime`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Field {
    /// [`CivilTime::seconds`]
    Seconds,
    /// [`CivilTime::minutes`]
    Minutes,
    /// [`CivilTime::hours`]
    Hours,
    /// [`CivilTime::weekday`]
    Weekday,
    /// [`CivilTime::day_of_month`]
    DayOfMonth,
    /// [`CivilTime::month`]
    Month,
    /// [`CivilTime::year`]
    Year,
}

/// The ways converting between a [`CivilTime`] and a [`RegisterImage`] can
/// fail.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A [`CivilTime`] field cannot be stored in the DS3231
    FieldOutOfRange(Field),
    /// A register read back from the DS3231 does not hold valid BCD, or holds
    /// a zero where the chip counts from one.
    MalformedRegisterImage {
        /// Which register was bad
        register: Register,
        /// What it contained
        value: u8,
    },
}

/// The ways talking to the DS3231 can fail.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// The I²C bus reported an error. Passed through unchanged.
    Bus(E),
    /// The time could not be encoded, or the chip sent back nonsense
    Codec(CodecError),
}

/// Represents the DS3231 chip on a particular I²C bus address.
///
/// Holds no other state; every call is a single bus transaction. The bus is
/// borrowed for the duration of that transaction only.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ds3231 {
    bus_address: u8,
}

//
// Public Data
//

/// The fixed 7-bit I²C address of the DS3231.
pub const DEVICE_ADDRESS: u8 = 0x68;

/// The timeout we recommend configuring on the I²C bus, in milliseconds.
///
/// `embedded-hal` buses own their timeouts, so this driver cannot apply it
/// for you.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Set in the hours register when the chip is in 12-hour mode.
pub const HOUR_12_FLAG: u8 = 0x40;

/// In 12-hour mode, set in the hours register for PM.
pub const HOUR_PM_FLAG: u8 = 0x20;

/// Set in the month register when the year counter rolls over from 99 to 00.
pub const CENTURY_FLAG: u8 = 0x80;

//
// Private Data
//

const TIME_REGISTER_COUNT: usize = 7;

/// Selects the hour digits in 12-hour mode
const HOUR_12_MASK: u8 = 0x1F;

/// Selects the month digits, discarding the century flag
const MONTH_MASK: u8 = 0x1F;

/// The DS3231 only stores the last two digits of the year
const YEAR_OFFSET: u16 = 100;

//
// Public Functions
//

/// Pack a decimal value from 0 to 99 into two BCD digits.
pub const fn decimal_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Unpack two BCD digits into a decimal value.
///
/// Nibbles above 9 are not checked for.
pub const fn bcd_to_decimal(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

//
// impls on Public Types
//

impl RegisterImage {
    /// Wrap seven bytes read from the chip.
    pub const fn from_bytes(bytes: [u8; TIME_REGISTER_COUNT]) -> RegisterImage {
        RegisterImage(bytes)
    }

    /// Get the seven register bytes.
    pub const fn as_bytes(&self) -> &[u8; TIME_REGISTER_COUNT] {
        &self.0
    }

    /// Unwrap into the seven register bytes.
    pub const fn into_bytes(self) -> [u8; TIME_REGISTER_COUNT] {
        self.0
    }

    /// Get the raw contents of one register.
    pub const fn register(&self, register: Register) -> u8 {
        self.0[register as usize]
    }

    /// Convert a [`CivilTime`] into the register layout of the DS3231.
    ///
    /// The hours are always written in 24-hour format. The daylight saving
    /// marker is discarded.
    pub fn encode(time: &CivilTime) -> Result<RegisterImage, CodecError> {
        let check = |value: u8, min: u8, max: u8, field: Field| {
            if (min..=max).contains(&value) {
                Ok(value)
            } else {
                Err(CodecError::FieldOutOfRange(field))
            }
        };
        let year = time
            .year
            .checked_sub(YEAR_OFFSET)
            .filter(|y| *y <= 99)
            .ok_or(CodecError::FieldOutOfRange(Field::Year))? as u8;
        let mut image = RegisterImage::default();
        let mut set = |reg: Register, value: u8| {
            image.0[reg as usize] = decimal_to_bcd(value);
        };
        set(Register::Seconds, check(time.seconds, 0, 59, Field::Seconds)?);
        set(Register::Minutes, check(time.minutes, 0, 59, Field::Minutes)?);
        set(Register::Hours, check(time.hours, 0, 23, Field::Hours)?);
        // The chip counts weekdays 1 to 7, so Sunday is 1
        set(Register::Weekday, check(time.weekday, 0, 6, Field::Weekday)? + 1);
        set(
            Register::DayOfMonth,
            check(time.day_of_month, 1, 31, Field::DayOfMonth)?,
        );
        set(Register::Month, check(time.month, 0, 11, Field::Month)? + 1);
        set(Register::Year, year);
        Ok(image)
    }

    /// Convert the register layout of the DS3231 into a [`CivilTime`].
    ///
    /// Understands both 12-hour and 24-hour mode. The century flag is
    /// ignored. Registers which are not valid BCD are rejected, but values
    /// which are valid BCD and merely out of range (like 60 seconds) are
    /// passed through.
    pub fn decode(&self) -> Result<CivilTime, CodecError> {
        let seconds = self.decode_field(Register::Seconds, 0xFF)?;
        let minutes = self.decode_field(Register::Minutes, 0xFF)?;
        let hours = self.decode_hours()?;
        let weekday = self.decode_field(Register::Weekday, 0xFF)?;
        let day_of_month = self.decode_field(Register::DayOfMonth, 0xFF)?;
        let month = self.decode_field(Register::Month, MONTH_MASK)?;
        let year = self.decode_field(Register::Year, 0xFF)?;
        Ok(CivilTime {
            seconds,
            minutes,
            hours,
            weekday: self.counts_from_one(Register::Weekday, weekday)?,
            day_of_month,
            month: self.counts_from_one(Register::Month, month)?,
            year: u16::from(year) + YEAR_OFFSET,
            daylight_saving: DaylightSaving::Unspecified,
        })
    }

    /// Decode the bits of `register` selected by `mask` as BCD.
    fn decode_field(&self, register: Register, mask: u8) -> Result<u8, CodecError> {
        let value = self.register(register);
        let digits = value & mask;
        if (digits >> 4) > 9 || (digits & 0x0F) > 9 {
            return Err(CodecError::MalformedRegisterImage { register, value });
        }
        Ok(bcd_to_decimal(digits))
    }

    fn decode_hours(&self) -> Result<u8, CodecError> {
        let value = self.register(Register::Hours);
        if value & HOUR_12_FLAG == 0 {
            return self.decode_field(Register::Hours, 0xFF);
        }
        // 12-hour mode: 1 AM is hour 0, 1 PM is hour 12
        let hour = self.decode_field(Register::Hours, HOUR_12_MASK)?;
        let hour = self.counts_from_one(Register::Hours, hour)?;
        if value & HOUR_PM_FLAG != 0 {
            Ok(hour + 12)
        } else {
            Ok(hour)
        }
    }

    /// Convert a decoded value which the chip counts from one into one
    /// which counts from zero.
    fn counts_from_one(&self, register: Register, decoded: u8) -> Result<u8, CodecError> {
        decoded
            .checked_sub(1)
            .ok_or(CodecError::MalformedRegisterImage {
                register,
                value: self.register(register),
            })
    }
}

impl TryFrom<&CivilTime> for RegisterImage {
    type Error = CodecError;

    fn try_from(time: &CivilTime) -> Result<RegisterImage, CodecError> {
        RegisterImage::encode(time)
    }
}

impl TryFrom<RegisterImage> for CivilTime {
    type Error = CodecError;

    fn try_from(image: RegisterImage) -> Result<CivilTime, CodecError> {
        image.decode()
    }
}

impl From<[u8; TIME_REGISTER_COUNT]> for RegisterImage {
    fn from(bytes: [u8; TIME_REGISTER_COUNT]) -> RegisterImage {
        RegisterImage(bytes)
    }
}

impl From<Register> for u8 {
    fn from(register: Register) -> u8 {
        register as u8
    }
}

impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Field::Seconds => "seconds",
            Field::Minutes => "minutes",
            Field::Hours => "hours",
            Field::Weekday => "weekday",
            Field::DayOfMonth => "day of month",
            Field::Month => "month",
            Field::Year => "year",
        };
        f.write_str(name)
    }
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CodecError::FieldOutOfRange(field) => {
                write!(f, "{} is out of range for the DS3231", field)
            }
            CodecError::MalformedRegisterImage { register, value } => {
                write!(
                    f,
                    "register 0x{:02x} holds invalid value 0x{:02x}",
                    *register as u8, value
                )
            }
        }
    }
}

impl<E> From<CodecError> for Error<E> {
    fn from(error: CodecError) -> Error<E> {
        Error::Codec(error)
    }
}

impl<E> core::fmt::Display for Error<E>
where
    E: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "I²C bus error: {:?}", e),
            Error::Codec(e) => write!(f, "{}", e),
        }
    }
}

impl Default for Ds3231 {
    fn default() -> Ds3231 {
        Ds3231::new()
    }
}

impl Ds3231 {
    /// Create a new DS3231 proxy object, at the fixed [`DEVICE_ADDRESS`].
    pub const fn new() -> Ds3231 {
        Ds3231::with_address(DEVICE_ADDRESS)
    }

    /// Create a new DS3231 proxy object at some other address.
    ///
    /// Only useful if the chip sits behind an address translator.
    pub const fn with_address(bus_address: u8) -> Ds3231 {
        Ds3231 { bus_address }
    }

    /// Get the I²C address we talk to.
    pub const fn address(&self) -> u8 {
        self.bus_address
    }

    /// Set the time on the DS3231, over I²C.
    ///
    /// The time is checked before anything goes on the bus. Bus errors are
    /// returned as-is and the write is not retried.
    pub fn set_time<B>(&self, bus: &mut B, time: &CivilTime) -> Result<(), Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::Write,
    {
        let image = RegisterImage::encode(time)?;
        let mut buffer = [0u8; TIME_REGISTER_COUNT + 1];
        buffer[0] = Register::Seconds.into();
        buffer[1..].copy_from_slice(image.as_bytes());
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Sending DS3231 0x{:02x} buffer {:02x}",
            self.bus_address,
            buffer
        );
        bus.write(self.bus_address, &buffer).map_err(Error::Bus)
    }

    /// Read the raw time-keeping registers from the DS3231, over I²C.
    ///
    /// No decoding is attempted.
    pub fn get_register_image<B>(&self, bus: &mut B) -> Result<RegisterImage, Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let mut buffer = [0u8; TIME_REGISTER_COUNT];
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Reading DS3231 0x{:02x} from register 0x{:02x}",
            self.bus_address,
            Register::Seconds as u8
        );
        bus.write_read(self.bus_address, &[Register::Seconds.into()], &mut buffer)
            .map_err(Error::Bus)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("Received DS3231 buffer {:02x}", buffer);
        Ok(RegisterImage(buffer))
    }

    /// Get the time from the DS3231, over I²C.
    ///
    /// If the bus reports an error, that error is returned and nothing is
    /// decoded.
    pub fn get_time<B>(&self, bus: &mut B) -> Result<CivilTime, Error<B::Error>>
    where
        B: embedded_hal::blocking::i2c::WriteRead,
    {
        let image = self.get_register_image(bus)?;
        image.decode().map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::warn!("DS3231 sent back bad time: {}", e);
            Error::Codec(e)
        })
    }
}

//
// Optional chrono support
//

#[cfg(feature = "chrono")]
impl TryFrom<&CivilTime> for chrono::NaiveDateTime {
    type Error = CodecError;

    fn try_from(time: &CivilTime) -> Result<chrono::NaiveDateTime, CodecError> {
        let date = chrono::NaiveDate::from_ymd_opt(
            i32::from(time.year) + 1900,
            u32::from(time.month) + 1,
            u32::from(time.day_of_month),
        )
        .ok_or(CodecError::FieldOutOfRange(Field::DayOfMonth))?;
        let clock = chrono::NaiveTime::from_hms_opt(
            u32::from(time.hours),
            u32::from(time.minutes),
            u32::from(time.seconds),
        )
        .ok_or(CodecError::FieldOutOfRange(Field::Hours))?;
        Ok(chrono::NaiveDateTime::new(date, clock))
    }
}

#[cfg(feature = "chrono")]
impl TryFrom<&chrono::NaiveDateTime> for CivilTime {
    type Error = CodecError;

    fn try_from(datetime: &chrono::NaiveDateTime) -> Result<CivilTime, CodecError> {
        use chrono::{Datelike, Timelike};
        let year = datetime
            .year()
            .checked_sub(1900)
            .and_then(|y| u16::try_from(y).ok())
            .ok_or(CodecError::FieldOutOfRange(Field::Year))?;
        Ok(CivilTime {
            seconds: datetime.second() as u8,
            minutes: datetime.minute() as u8,
            hours: datetime.hour() as u8,
            weekday: datetime.weekday().num_days_from_sunday() as u8,
            day_of_month: datetime.day() as u8,
            month: datetime.month0() as u8,
            year,
            daylight_saving: DaylightSaving::Unspecified,
        })
    }
}

//
// Tests
//


//
// End of file
//
