//! End to end tests over a synthetic recording built in memory: a TMATS
//! setup packet, a Time packet, then interleaved 1553 and Ethernet traffic.

use std::fs::File;
use std::io::{Cursor, Write};

use ch10::decode::{ethernet, ms1553, tmats::Tmats};
use ch10::packet::{Ch10Reader, DataType, FileMode, PacketHeader, Summary, SYNC};
use ch10::table;
use ch10::time::{DateFormat, IrigTime, TimeRef, RTC_TICKS_PER_SEC};

fn encode_packet(channel_id: u16, data_type: DataType, body: &[u8], rel_time: u64) -> Vec<u8> {
    let mut raw = vec![0u8; PacketHeader::LEN];
    raw[0..2].copy_from_slice(&SYNC.to_le_bytes());
    raw[2..4].copy_from_slice(&channel_id.to_le_bytes());
    // packets carry filler out to a 4-byte boundary
    let padded = (body.len() + 3) & !3;
    let packet_len = (PacketHeader::LEN + padded) as u32;
    raw[4..8].copy_from_slice(&packet_len.to_le_bytes());
    raw[8..12].copy_from_slice(&(body.len() as u32).to_le_bytes());
    raw[12] = 0x06;
    raw[15] = data_type.0;
    raw[16..22].copy_from_slice(&rel_time.to_le_bytes()[..6]);
    let mut fixed = [0u8; PacketHeader::LEN];
    fixed.copy_from_slice(&raw);
    let sum = PacketHeader::compute_checksum(&fixed);
    raw[22..24].copy_from_slice(&sum.to_le_bytes());
    raw.extend_from_slice(body);
    raw.resize(PacketHeader::LEN + padded, 0);
    raw
}

fn bcd(value: u16) -> u16 {
    ((value / 10) << 4) | (value % 10)
}

/// Time Format 1 body, external source, day-of-year.
fn time_body(day: u16, h: u16, m: u16, s: u16) -> Vec<u8> {
    let csdw: u32 = 0x1;
    let w0 = bcd(s) << 8;
    let w1 = (bcd(h) << 8) | bcd(m);
    let w2 = (bcd(day / 100) << 8) | bcd(day % 100);
    let mut body = csdw.to_le_bytes().to_vec();
    for w in [w0, w1, w2] {
        body.extend_from_slice(&w.to_le_bytes());
    }
    body
}

fn cmd_word(rt: u16, transmit: bool, subaddr: u16, wc: u16) -> u16 {
    (rt << 11) | (u16::from(transmit) << 10) | (subaddr << 5) | (wc & 0x1f)
}

/// 1553 Format 1 body with the given (ipts, words) messages.
fn ms1553_body(msgs: &[(u64, Vec<u16>)]) -> Vec<u8> {
    let mut body = (msgs.len() as u32).to_le_bytes().to_vec();
    for (ipts, words) in msgs {
        body.extend_from_slice(&ipts.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes()); // block status
        body.push(0);
        body.push(0);
        body.extend_from_slice(&((words.len() * 2) as u16).to_le_bytes());
        for w in words {
            body.extend_from_slice(&w.to_le_bytes());
        }
    }
    body
}

/// Ethernet Format 0 body with one frame per entry.
fn ethernet_body(frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut body = (frames.len() as u32).to_le_bytes().to_vec();
    for (ipts, frame) in frames {
        body.extend_from_slice(&ipts.to_le_bytes());
        body.extend_from_slice(&(frame.len() as u32 & 0x3fff).to_le_bytes());
        body.extend_from_slice(frame);
        if frame.len() % 2 != 0 {
            body.push(0);
        }
    }
    body
}

fn eth_frame(type_len: u16, payload: &[u8]) -> Vec<u8> {
    let mut f = vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x01]; // dst
    f.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]); // src
    f.extend_from_slice(&type_len.to_be_bytes());
    f.extend_from_slice(payload);
    f
}

/// One anchor time packet at rel 10^7, then 1553 traffic on channel 2 and
/// Ethernet on channel 3, one second apart.
fn recording() -> Vec<u8> {
    let mut dat = encode_packet(
        0,
        DataType::TMATS,
        &{
            let mut b = 8u32.to_le_bytes().to_vec();
            b.extend_from_slice(b"G\\PN:Flight Test;\r\nR-1\\ID:Recorder;");
            b
        },
        RTC_TICKS_PER_SEC / 2,
    );
    // anchor: day 100, 12:00:00
    dat.extend(encode_packet(
        1,
        DataType::IRIG_TIME,
        &time_body(100, 12, 0, 0),
        RTC_TICKS_PER_SEC,
    ));
    for i in 0..3u64 {
        let rel = RTC_TICKS_PER_SEC * (2 + i);
        dat.extend(encode_packet(
            2,
            DataType::MIL1553_FMT_1,
            &ms1553_body(&[
                (rel, vec![cmd_word(5, false, 1, 2), 0xa0a0 + i as u16, 0xb0b0, 0x2800]),
                (rel + 1000, vec![cmd_word(5, true, 1, 1), 0x2800, 0xc0c0]),
            ]),
            rel,
        ));
        dat.extend(encode_packet(
            3,
            DataType::ETHERNET_FMT_0,
            &ethernet_body(&[(rel + 2000, eth_frame(0x0800, &[1, 2, 3, i as u8]))]),
            rel + 2000,
        ));
    }
    dat
}

#[test]
fn sync_time_finds_anchor_and_restores_position() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let time_ref = TimeRef::sync_time(&mut reader, true, 10).unwrap();

    assert_eq!(time_ref.rel_time(), RTC_TICKS_PER_SEC);
    assert_eq!(time_ref.time().format, DateFormat::DayOfYear);
    assert_eq!(time_ref.time().to_string(), "100:12:00:00.000000");

    // position restored; the first packet is still the TMATS packet
    let header = *reader.read_next_header().unwrap().unwrap();
    assert_eq!(header.data_type, DataType::TMATS);
}

#[test]
fn sync_time_gives_up_within_limit() {
    // no time packets at all, counters one second apart
    let mut dat = Vec::new();
    for i in 0..10u64 {
        dat.extend(encode_packet(
            2,
            DataType::MIL1553_FMT_1,
            &ms1553_body(&[]),
            RTC_TICKS_PER_SEC * i,
        ));
    }
    let mut reader = Ch10Reader::from_reader(Cursor::new(dat));
    assert!(matches!(
        TimeRef::sync_time(&mut reader, false, 3),
        Err(ch10::Error::TimeNotFound)
    ));
    // position restored even on failure
    assert_eq!(reader.get_pos(), 0);
}

#[test]
fn time_ref_reanchors_on_time_packets_while_walking() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let bogus = IrigTime::new(0, 0, DateFormat::DayOfYear);
    let mut time_ref = TimeRef::set_relative_time(0, bogus);

    loop {
        let Some(header) = reader.read_next_header().unwrap().copied() else {
            break;
        };
        if header.data_type == DataType::IRIG_TIME {
            reader.read_data().unwrap();
        }
        // a no-op for every packet whose payload was not read
        time_ref.update_from_packet(&reader).unwrap();
    }

    assert_eq!(time_ref.rel_time(), RTC_TICKS_PER_SEC);
    assert_eq!(time_ref.time().to_string(), "100:12:00:00.000000");
}

#[test]
fn external_sync_skips_internal_time_source() {
    let mut internal = time_body(100, 6, 0, 0);
    internal[0] = 0; // source field: internal clock
    let mut dat = encode_packet(1, DataType::IRIG_TIME, &internal, RTC_TICKS_PER_SEC);
    dat.extend(encode_packet(
        1,
        DataType::IRIG_TIME,
        &time_body(100, 12, 0, 0),
        2 * RTC_TICKS_PER_SEC,
    ));

    let mut reader = Ch10Reader::from_reader(Cursor::new(dat));
    let time_ref = TimeRef::sync_time(&mut reader, true, 10).unwrap();
    assert_eq!(time_ref.rel_time(), 2 * RTC_TICKS_PER_SEC);
    assert_eq!(time_ref.time().to_string(), "100:12:00:00.000000");
}

#[test]
fn sync_time_skips_undecodable_time_packet() {
    // 79 seconds is not a valid BCD time of day
    let mut dat = encode_packet(
        1,
        DataType::IRIG_TIME,
        &time_body(100, 0, 0, 79),
        RTC_TICKS_PER_SEC,
    );
    dat.extend(encode_packet(
        1,
        DataType::IRIG_TIME,
        &time_body(100, 12, 0, 0),
        2 * RTC_TICKS_PER_SEC,
    ));

    let mut reader = Ch10Reader::from_reader(Cursor::new(dat));
    let time_ref = TimeRef::sync_time(&mut reader, true, 10).unwrap();
    assert_eq!(time_ref.rel_time(), 2 * RTC_TICKS_PER_SEC);
    assert_eq!(time_ref.time().to_string(), "100:12:00:00.000000");
}

#[test]
fn export_survives_truncated_1553_packet() {
    let words = vec![cmd_word(5, false, 1, 1), 0x1111, 0x2800];
    let mut bad = ms1553_body(&[(RTC_TICKS_PER_SEC, words.clone())]);
    // declare a second message the body does not carry
    bad[0..4].copy_from_slice(&2u32.to_le_bytes());
    let mut dat = encode_packet(2, DataType::MIL1553_FMT_1, &bad, RTC_TICKS_PER_SEC);
    dat.extend(encode_packet(
        2,
        DataType::MIL1553_FMT_1,
        &ms1553_body(&[(2 * RTC_TICKS_PER_SEC, words)]),
        2 * RTC_TICKS_PER_SEC,
    ));

    let mut reader = Ch10Reader::from_reader(Cursor::new(dat));
    let anchor = IrigTime::new(1_600_000_000, 0, DateFormat::DayOfYear);
    let time_ref = TimeRef::set_relative_time(RTC_TICKS_PER_SEC, anchor);
    let rows = table::export_1553(&mut reader, &time_ref, &[]).unwrap();

    // the decodable message from the bad packet plus the good packet's
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].time.secs, 1_600_000_000);
    assert_eq!(rows[1].time.secs, 1_600_000_001);
}

#[test]
fn summary_counts_whole_recording() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let mut summary = Summary::default();
    for header in reader.packet_headers(&[]) {
        summary.add(&header.unwrap());
    }

    assert_eq!(summary.packet_count, 8);
    assert_eq!(summary.channels.len(), 4);
    assert_eq!(summary.channels[&2].packet_count, 3);
    assert_eq!(
        summary.channels_of_type(DataType::ETHERNET_FMT_0),
        vec![3]
    );
}

#[test]
fn channel_filter_and_1553_decode() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let mut total = 0;
    loop {
        let Some(header) = reader.read_next_header().unwrap().copied() else {
            break;
        };
        if header.channel_id != 2 {
            continue;
        }
        assert_eq!(header.data_type, DataType::MIL1553_FMT_1);
        let payload = reader.read_data().unwrap();
        for msg in ms1553::messages(payload).unwrap() {
            let msg = msg.unwrap();
            assert_eq!(msg.cmd1.rt_address(), 5);
            total += 1;
        }
    }
    assert_eq!(total, 6);
}

#[test]
fn ethernet_frames_decode() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let mut frames = Vec::new();
    loop {
        let Some(header) = reader.read_next_header().unwrap().copied() else {
            break;
        };
        if header.data_type != DataType::ETHERNET_FMT_0 {
            continue;
        }
        let payload = reader.read_data().unwrap();
        for frame in ethernet::frames(payload).unwrap() {
            frames.push(frame.unwrap());
        }
    }
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.type_len == 0x0800));
    assert_eq!(frames[0].dst.to_string(), "02:00:00:00:00:01");
}

#[test]
fn tmats_describes_recording() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let header = *reader.read_next_header().unwrap().unwrap();
    assert_eq!(header.data_type, DataType::TMATS);
    let t = Tmats::decode(reader.read_data().unwrap()).unwrap();
    assert_eq!(t.find("G\\PN"), "Flight Test");
    assert_eq!(t.csdw.version_label(), "106-09");
}

#[test]
fn exported_rows_are_timestamped_and_monotonic() {
    let mut reader = Ch10Reader::from_reader(Cursor::new(recording()));
    let time_ref = TimeRef::sync_time(&mut reader, true, 10).unwrap();
    let rows = table::export_1553(&mut reader, &time_ref, &[2]).unwrap();

    assert_eq!(rows.len(), 6);
    // first message is one second after the anchor
    assert_eq!(rows[0].time.to_string(), "100:12:00:01.000000");
    for pair in rows.windows(2) {
        let a = (pair[0].time.secs, pair[0].time.fracs);
        let b = (pair[1].time.secs, pair[1].time.fracs);
        assert!(a <= b, "rows out of time order: {a:?} > {b:?}");
    }
    // rows survive a flatten and rebuild
    let back = table::Row1553::decode(&rows[0].encode()).unwrap();
    assert_eq!(back, rows[0]);
}

#[test]
fn corrupt_packet_is_skipped_and_reading_continues() {
    let mut dat = recording();
    // corrupt the second packet's checksum (the time packet)
    let tmats_body_len = {
        let mut b = 8u32.to_le_bytes().to_vec();
        b.extend_from_slice(b"G\\PN:Flight Test;\r\nR-1\\ID:Recorder;");
        b.len()
    };
    let second = PacketHeader::LEN + ((tmats_body_len + 3) & !3);
    dat[second + 22] ^= 0xff;

    let mut reader = Ch10Reader::from_reader(Cursor::new(dat));
    let mut seen = Vec::new();
    loop {
        match reader.read_next_header() {
            Ok(Some(header)) => seen.push(header.channel_id),
            Ok(None) => break,
            Err(ch10::Error::HeaderChecksum { .. }) => continue,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    // everything but the corrupted time packet
    assert_eq!(seen, vec![0, 2, 3, 2, 3, 2, 3]);
}

#[test]
fn reads_from_file_on_disk() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = tmpdir.path().join("flight.ch10");
    File::create(&path)
        .unwrap()
        .write_all(&recording())
        .unwrap();

    let mut reader = Ch10Reader::open(&path, FileMode::Read).unwrap();
    let count = reader.packet_headers(&[]).count();
    assert_eq!(count, 8);
}
