use bytes::{Buf, BufMut, BytesMut};
use chrono::{NaiveDate, NaiveTime};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{
    Acceleration, AirData, AltimeterSetting, Attitude, Axis, ChannelId, Frame, GpsPosition,
    GpsVector, PressureData, Reading, TimeSync,
};
use crate::core::{Error, Result, INHG_HUNDREDTHS_PER_HPA, MAX_STANDARD_ID};

/// Decodes a frame according to its channel's fixed little-endian layout.
///
/// Pure: nothing is written anywhere, so a failed decode can never leave a
/// partially updated channel behind.
pub fn decode(frame: &Frame) -> Result<Reading> {
    let channel = frame.channel().ok_or(Error::UnknownChannel(frame.id))?;
    let expected = channel.payload_len();
    if frame.data.len() != expected {
        return Err(Error::frame_length(channel, expected, frame.data.len()));
    }

    let mut buf = &frame.data[..];
    let reading = match channel {
        ChannelId::AirPrimary => Reading::AirData(AirData {
            airspeed: buf.get_i16_le(),
            altitude: buf.get_i32_le(),
            vsi: buf.get_i16_le(),
        }),
        ChannelId::Pressure => {
            let static_pressure = buf.get_i16_le();
            let temperature = buf.get_i8();
            let differential_pressure = buf.get_i16_le();
            Reading::Pressure(PressureData {
                static_pressure,
                temperature,
                differential_pressure,
            })
        }
        ChannelId::AltimeterSetting => {
            let hpa = buf.get_i16_le();
            let quarters = buf.get_i16_le();
            Reading::AltimeterSetting(AltimeterSetting {
                inhg_hundredths: f64::from(quarters) / 4.0,
                hpa,
            })
        }
        ChannelId::Attitude => {
            let yaw = buf.get_i16_le();
            let pitch = buf.get_i16_le();
            let roll = buf.get_i16_le();
            let turn_rate = buf.get_i16_le();
            Reading::Attitude(Attitude {
                yaw: 360.0 - f64::from(yaw) / 10.0,
                pitch: -f64::from(pitch) / 10.0,
                roll: f64::from(roll) / 10.0,
                turn_rate,
            })
        }
        ChannelId::Acceleration => Reading::Acceleration(Acceleration {
            x: buf.get_i16_le(),
            y: buf.get_i16_le(),
            z: buf.get_i16_le(),
            calibration: buf.get_i16_le(),
        }),
        ChannelId::GpsPosition => Reading::GpsPosition(GpsPosition {
            latitude: buf.get_i32_le(),
            longitude: buf.get_i32_le(),
        }),
        ChannelId::GpsVector => Reading::GpsVector(GpsVector {
            speed: buf.get_i16_le(),
            altitude: buf.get_i16_le(),
            true_track: buf.get_i16_le(),
        }),
        ChannelId::MagneticX => decode_magnetic(Axis::X, buf.get_f32_le())?,
        ChannelId::MagneticY => decode_magnetic(Axis::Y, buf.get_f32_le())?,
        ChannelId::MagneticZ => decode_magnetic(Axis::Z, buf.get_f32_le())?,
        ChannelId::TimeSync => Reading::TimeSync(decode_time_sync(&mut buf)?),
    };

    Ok(reading)
}

fn decode_magnetic(axis: Axis, value: f32) -> Result<Reading> {
    if !value.is_finite() {
        return Err(Error::frame_decode(format!(
            "magnetometer {:?} axis is not finite: {}",
            axis, value
        )));
    }
    Ok(Reading::Magnetic { axis, value })
}

fn decode_time_sync(buf: &mut &[u8]) -> Result<TimeSync> {
    let year_offset = buf.get_i8();
    let mut fields = [0u8; 5];
    for (field, name) in fields
        .iter_mut()
        .zip(["month", "day", "hour", "minute", "second"])
    {
        let raw = buf.get_i8();
        *field = u8::try_from(raw)
            .map_err(|_| Error::frame_decode(format!("time sync {} is negative: {}", name, raw)))?;
    }
    let [month, day, hour, minute, second] = fields;
    let year = 2000 + i32::from(year_offset);

    NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day)).ok_or_else(|| {
        Error::frame_decode(format!("time sync date {}-{}-{} is invalid", year, month, day))
    })?;
    NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)).ok_or_else(
        || Error::frame_decode(format!("time sync time {}:{}:{} is invalid", hour, minute, second)),
    )?;

    Ok(TimeSync {
        year,
        month,
        day,
        hour,
        minute,
        second,
    })
}

/// Packs an altimeter setting (hundredths of inHg) into the 8-byte wire layout:
/// truncated hPa, the setting × 4, then four zero pad bytes.
pub fn encode_altimeter_setting(inhg_hundredths: i32) -> Result<[u8; 8]> {
    let hpa = (f64::from(inhg_hundredths) / INHG_HUNDREDTHS_PER_HPA).trunc();
    let hpa = i16::try_from(hpa as i64)
        .map_err(|_| Error::frame_decode(format!("hPa value {} overflows i16", hpa)))?;
    let quarters = inhg_hundredths
        .checked_mul(4)
        .and_then(|q| i16::try_from(q).ok())
        .ok_or_else(|| {
            Error::frame_decode(format!("setting {} overflows the i16 wire field", inhg_hundredths))
        })?;

    let mut payload = [0u8; 8];
    let mut out = &mut payload[..];
    out.put_i16_le(hpa);
    out.put_i16_le(quarters);
    Ok(payload)
}

/// Builds the outbound altimeter-setting frame
pub fn altimeter_setting_frame(id: u32, inhg_hundredths: i32) -> Result<Frame> {
    let payload = encode_altimeter_setting(inhg_hundredths)?;
    Ok(Frame::new(id, payload.to_vec()))
}

/// Size of one Linux `struct can_frame` record
pub const CAN_FRAME_RECORD_LEN: usize = 16;

const CAN_EFF_FLAG: u32 = 0x8000_0000;
const CAN_RTR_FLAG: u32 = 0x4000_0000;
const CAN_ERR_FLAG: u32 = 0x2000_0000;
const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

/// Byte-stream codec for Linux `struct can_frame` records.
///
/// Each record is 16 bytes: a little-endian `u32` identifier with flag bits,
/// the data length, three reserved bytes and eight data bytes. Remote and
/// error frames carry no telemetry and are skipped, as are records claiming
/// more than eight data bytes.
#[derive(Clone, Debug, Default)]
pub struct CanFrameCodec;

impl CanFrameCodec {
    /// Creates a new frame codec
    pub fn new() -> Self {
        CanFrameCodec
    }
}

impl Decoder for CanFrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        while src.len() >= CAN_FRAME_RECORD_LEN {
            let mut record = src.split_to(CAN_FRAME_RECORD_LEN);
            let raw_id = record.get_u32_le();
            let len = usize::from(record.get_u8());
            record.advance(3);

            if raw_id & (CAN_RTR_FLAG | CAN_ERR_FLAG) != 0 || len > 8 {
                continue;
            }

            let id = if raw_id & CAN_EFF_FLAG != 0 {
                raw_id & CAN_EFF_MASK
            } else {
                raw_id & MAX_STANDARD_ID
            };
            return Ok(Some(Frame::new(id, record.split_to(len).freeze())));
        }

        // Need more data for a full record
        Ok(None)
    }
}

impl Encoder<Frame> for CanFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        if item.id > MAX_STANDARD_ID {
            return Err(Error::transport_send(format!(
                "identifier 0x{:X} is not a standard 11-bit id",
                item.id
            )));
        }
        if item.data.len() > 8 {
            return Err(Error::transport_send(format!(
                "payload of {} bytes exceeds 8",
                item.data.len()
            )));
        }

        dst.reserve(CAN_FRAME_RECORD_LEN);
        dst.put_u32_le(item.id);
        dst.put_u8(item.data.len() as u8);
        dst.put_bytes(0, 3);
        dst.put_slice(&item.data);
        dst.put_bytes(0, 8 - item.data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(channel: ChannelId, payload: &[u8]) -> Frame {
        Frame::new(channel.raw(), payload.to_vec())
    }

    fn i16s(values: [i16; 4]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_air_primary_negative_altitude() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&120i16.to_le_bytes());
        payload.extend_from_slice(&(-1000i32).to_le_bytes());
        payload.extend_from_slice(&(-350i16).to_le_bytes());

        let reading = decode(&frame(ChannelId::AirPrimary, &payload)).unwrap();
        assert_eq!(
            reading,
            Reading::AirData(AirData {
                airspeed: 120,
                altitude: -1000,
                vsi: -350,
            })
        );
    }

    #[test]
    fn test_pressure_layout() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&10132i16.to_le_bytes());
        payload.push((-12i8) as u8);
        payload.extend_from_slice(&412i16.to_le_bytes());
        payload.extend_from_slice(&[0, 0, 0]);

        let reading = decode(&frame(ChannelId::Pressure, &payload)).unwrap();
        assert_eq!(
            reading,
            Reading::Pressure(PressureData {
                static_pressure: 10132,
                temperature: -12,
                differential_pressure: 412,
            })
        );
    }

    #[test]
    fn test_altimeter_setting_scenario() {
        let payload = encode_altimeter_setting(2992).unwrap();
        assert_eq!(i16::from_le_bytes([payload[0], payload[1]]), 1013);
        assert_eq!(i16::from_le_bytes([payload[2], payload[3]]), 11968);
        assert_eq!(&payload[4..], &[0, 0, 0, 0]);

        match decode(&frame(ChannelId::AltimeterSetting, &payload)).unwrap() {
            Reading::AltimeterSetting(setting) => {
                assert_eq!(setting.hpa, 1013);
                assert_eq!(setting.inhg_hundredths, 2992.0);
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_altimeter_setting_quarter_precision() {
        let payload = i16s([1013, 11969, 0, 0]);
        match decode(&frame(ChannelId::AltimeterSetting, &payload)).unwrap() {
            Reading::AltimeterSetting(setting) => assert_eq!(setting.inhg_hundredths, 2992.25),
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_attitude_conversion() {
        let reading = decode(&frame(ChannelId::Attitude, &i16s([150, 25, -300, 3]))).unwrap();
        match reading {
            Reading::Attitude(att) => {
                assert_eq!(att.yaw, 345.0);
                assert_eq!(att.pitch, -2.5);
                assert_eq!(att.roll, -30.0);
                assert_eq!(att.turn_rate, 3);
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_acceleration_layout() {
        assert_eq!(
            decode(&frame(ChannelId::Acceleration, &i16s([-981, 12, 1003, 3]))).unwrap(),
            Reading::Acceleration(Acceleration {
                x: -981,
                y: 12,
                z: 1003,
                calibration: 3,
            })
        );
    }

    #[test]
    fn test_gps_frames() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&45_123_456i32.to_le_bytes());
        payload.extend_from_slice(&(-75_654_321i32).to_le_bytes());
        assert_eq!(
            decode(&frame(ChannelId::GpsPosition, &payload)).unwrap(),
            Reading::GpsPosition(GpsPosition {
                latitude: 45_123_456,
                longitude: -75_654_321,
            })
        );

        assert_eq!(
            decode(&frame(ChannelId::GpsVector, &i16s([95, 4500, 271, 0]))).unwrap(),
            Reading::GpsVector(GpsVector {
                speed: 95,
                altitude: 4500,
                true_track: 271,
            })
        );
    }

    #[test]
    fn test_magnetic_axis() {
        let payload = (-0.25f32).to_le_bytes();
        assert_eq!(
            decode(&frame(ChannelId::MagneticY, &payload)).unwrap(),
            Reading::Magnetic { axis: Axis::Y, value: -0.25 }
        );

        let nan = f32::NAN.to_le_bytes();
        assert!(matches!(
            decode(&frame(ChannelId::MagneticX, &nan)),
            Err(Error::FrameDecode(_))
        ));
    }

    #[test]
    fn test_time_sync() {
        let payload = [24u8, 6, 30, 23, 59, 58, 0, 0];
        assert_eq!(
            decode(&frame(ChannelId::TimeSync, &payload)).unwrap(),
            Reading::TimeSync(TimeSync {
                year: 2024,
                month: 6,
                day: 30,
                hour: 23,
                minute: 59,
                second: 58,
            })
        );

        let invalid_date = [24u8, 2, 30, 12, 0, 0, 0, 0];
        assert!(matches!(
            decode(&frame(ChannelId::TimeSync, &invalid_date)),
            Err(Error::FrameDecode(_))
        ));

        let negative_hour = [24u8, 1, 1, 0xFF, 0, 0, 0, 0];
        assert!(matches!(
            decode(&frame(ChannelId::TimeSync, &negative_hour)),
            Err(Error::FrameDecode(_))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        for channel in ChannelId::ALL {
            let short = vec![0u8; channel.payload_len() - 1];
            match decode(&frame(channel, &short)) {
                Err(Error::FrameLength { channel: c, expected, actual }) => {
                    assert_eq!(c, channel);
                    assert_eq!(expected, channel.payload_len());
                    assert_eq!(actual, channel.payload_len() - 1);
                }
                other => panic!("expected length error, got {:?}", other),
            }
        }

        assert!(matches!(
            decode(&frame(ChannelId::MagneticZ, &[0u8; 8])),
            Err(Error::FrameLength { .. })
        ));
    }

    #[test]
    fn test_unknown_channel() {
        assert!(matches!(
            decode(&Frame::new(0x123, vec![0u8; 8])),
            Err(Error::UnknownChannel(0x123))
        ));
    }

    #[test]
    fn test_encode_rejects_overflow() {
        assert!(encode_altimeter_setting(9000).is_err());
        let frame = altimeter_setting_frame(0x2E, 2800).unwrap();
        assert_eq!(frame.id, 0x2E);
        assert_eq!(frame.data.len(), 8);
    }

    #[test]
    fn test_can_frame_codec() {
        let mut codec = CanFrameCodec::new();
        let mut bytes = BytesMut::new();

        let original = Frame::new(0x48, i16s([150, 0, 0, 0]));
        codec.encode(original.clone(), &mut bytes).unwrap();
        assert_eq!(bytes.len(), CAN_FRAME_RECORD_LEN);

        // A partial record is not yet a frame
        let mut partial = bytes.split_to(10);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        partial.unsplit(bytes);

        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded, original);
        assert!(partial.is_empty());
    }

    #[test]
    fn test_can_frame_codec_skips_remote_frames() {
        let mut codec = CanFrameCodec::new();
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(0x2E | CAN_RTR_FLAG);
        bytes.put_bytes(0, 12);
        codec.encode(Frame::new(0x19, vec![1, 2]), &mut bytes).unwrap();

        let decoded = codec.decode(&mut bytes).unwrap().unwrap();
        assert_eq!(decoded, Frame::new(0x19, vec![1, 2]));
    }

    #[test]
    fn test_can_frame_codec_skips_oversized_records() {
        let mut codec = CanFrameCodec::new();
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(0x48);
        bytes.put_u8(15);
        bytes.put_bytes(0, 11);

        assert!(codec.decode(&mut bytes).unwrap().is_none());
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_can_frame_codec_rejects_extended_send() {
        let mut codec = CanFrameCodec::new();
        let mut bytes = BytesMut::new();
        assert!(codec.encode(Frame::new(0x800, vec![0]), &mut bytes).is_err());
        assert!(codec.encode(Frame::new(0x1, vec![0; 9]), &mut bytes).is_err());
    }
}
