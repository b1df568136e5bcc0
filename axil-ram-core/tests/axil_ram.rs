use axil_ram_core::{
    AxiLiteAr, AxiLiteAw, AxiLiteBus, AxiLiteRam, AxiLiteW, AxiResp, BusWidths, Memory,
    RamConfig, ResetSignal,
};
use futures::channel::mpsc;
use std::time::Duration;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(1);
/// How long to wait before concluding that no beat is coming.
const QUIET: Duration = Duration::from_millis(50);

fn new_ram(size: usize) -> (AxiLiteBus, AxiLiteRam) {
    let bus = AxiLiteBus::new(BusWidths::new(32, 32));
    let ram = AxiLiteRam::new(bus.clone(), None, RamConfig { size }).unwrap();
    (bus, ram)
}

async fn write(bus: &AxiLiteBus, addr: u64, data: u32, strb: Option<u16>) -> AxiResp {
    bus.write.aw.send(AxiLiteAw::new(addr, None)).await;
    bus.write.w.send(AxiLiteW::new(data.into(), strb)).await;
    timeout(TIMEOUT, bus.write.b.recv()).await.unwrap().resp
}

async fn read(bus: &AxiLiteBus, addr: u64) -> u32 {
    bus.read.ar.send(AxiLiteAr::new(addr, None)).await;
    let r = timeout(TIMEOUT, bus.read.r.recv()).await.unwrap();
    assert_eq!(AxiResp::Okay, r.resp);
    u32::try_from(r.data).unwrap()
}

/// Waits until both halves of `ram` have applied the reset state `asserted`.
async fn wait_for_reset(ram: &AxiLiteRam, asserted: bool) {
    timeout(TIMEOUT, async {
        loop {
            let write = ram.write_if();
            let read = ram.read_if();
            if write.in_reset().await == asserted
                && read.in_reset().await == asserted
                && write.is_running().await != asserted
                && read.is_running().await != asserted
            {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn narrow_write_then_read() {
    let (bus, ram) = new_ram(1024);
    ram.memory().write(0x10, &[0x11, 0x22, 0x33, 0x44]);

    assert_eq!(AxiResp::Okay, write(&bus, 0x10, 0xAABBCCDD, Some(0b0011)).await);
    assert_eq!(vec![0xDD, 0xCC, 0x33, 0x44], ram.memory().read_vec(0x10, 4));
    assert_eq!(0x4433_CCDD, read(&bus, 0x10).await);
}

#[tokio::test]
async fn round_trip() {
    let (bus, _ram) = new_ram(1024);

    for (i, addr) in (0..1024).step_by(68).enumerate() {
        let value = 0x0101_0101u32.wrapping_mul(i as u32) ^ 0xDEAD_BEEF;
        assert_eq!(AxiResp::Okay, write(&bus, addr, value, None).await);
        assert_eq!(value, read(&bus, addr).await);
    }
}

#[tokio::test]
async fn one_response_per_write_in_order() {
    let (bus, ram) = new_ram(1024);

    let master = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for i in 0..16u32 {
                bus.write.aw.send(AxiLiteAw::new(u64::from(i) * 4, None)).await;
                bus.write.w.send(AxiLiteW::new(i.into(), None)).await;
            }
        })
    };

    for _ in 0..16 {
        let b = timeout(TIMEOUT, bus.write.b.recv()).await.unwrap();
        assert_eq!(AxiResp::Okay, b.resp);
    }
    master.await.unwrap();
    assert!(timeout(QUIET, bus.write.b.recv()).await.is_err());

    for i in 0..16u32 {
        assert_eq!(i.to_le_bytes().to_vec(), ram.memory().read_vec(u64::from(i) * 4, 4));
    }
}

#[tokio::test]
async fn data_before_address() {
    let (bus, ram) = new_ram(64);

    bus.write.w.send(AxiLiteW::new(0x0403_0201, None)).await;
    assert!(timeout(QUIET, bus.write.b.recv()).await.is_err());

    bus.write.aw.send(AxiLiteAw::new(8, None)).await;
    assert_eq!(
        AxiResp::Okay,
        timeout(TIMEOUT, bus.write.b.recv()).await.unwrap().resp
    );
    assert_eq!(vec![1, 2, 3, 4], ram.memory().read_vec(8, 4));
}

#[tokio::test]
async fn address_channel_applies_back_pressure() {
    let (bus, _ram) = new_ram(64);

    // The engine takes the first address and waits for its data; two more fit in the queue.
    bus.write.aw.send(AxiLiteAw::new(0, None)).await;
    bus.write.aw.send(AxiLiteAw::new(4, None)).await;
    bus.write.aw.send(AxiLiteAw::new(8, None)).await;
    timeout(TIMEOUT, async {
        while !bus.write.aw.is_full() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(bus.write.aw.try_send(AxiLiteAw::new(12, None)).is_err());

    bus.write.w.send(AxiLiteW::new(0, None)).await;
    timeout(TIMEOUT, bus.write.b.recv()).await.unwrap();
    timeout(TIMEOUT, bus.write.aw.send(AxiLiteAw::new(12, None)))
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_abandons_transaction_in_flight() {
    let (bus, ram) = new_ram(64);
    ram.memory().write(0, &[0xEE; 16]);

    // One address taken by the engine, one queued; no data yet.
    bus.write.aw.send(AxiLiteAw::new(0, None)).await;
    bus.write.aw.send(AxiLiteAw::new(4, None)).await;
    tokio::task::yield_now().await;

    ram.assert_reset(true).await;
    assert!(ram.in_reset().await);
    assert!(!ram.write_if().is_running().await);
    assert!(!ram.read_if().is_running().await);
    assert!(bus.write.aw.is_empty());
    assert!(bus.write.w.is_empty());
    assert!(bus.write.b.is_empty());
    assert!(bus.write.aw.try_send(AxiLiteAw::new(12, None)).is_err());
    assert!(bus.write.w.try_send(AxiLiteW::new(0, None)).is_err());

    ram.assert_reset(false).await;
    assert!(ram.is_running().await);

    // The new engine pairs the data with the first address sent after reset.
    assert_eq!(AxiResp::Okay, write(&bus, 8, 0x0403_0201, None).await);
    assert_eq!(vec![0xEE; 8], ram.memory().read_vec(0, 8));
    assert_eq!(vec![1, 2, 3, 4], ram.memory().read_vec(8, 4));
    assert!(timeout(QUIET, bus.write.b.recv()).await.is_err());
}

#[tokio::test]
async fn no_pre_reset_response_after_reset() {
    let (bus, ram) = new_ram(64);

    // Nobody consumes responses: two fill the queue and the engine stalls on the third.
    for i in 0..3u32 {
        bus.write.aw.send(AxiLiteAw::new(u64::from(i) * 4, None)).await;
        bus.write.w.send(AxiLiteW::new(0x1111_1111 * u128::from(i + 1), None)).await;
    }
    timeout(TIMEOUT, async {
        while ram.memory().read_byte(8) != 0x33 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(bus.write.b.is_full());

    ram.assert_reset(true).await;
    assert!(bus.write.b.is_empty());
    ram.assert_reset(false).await;

    assert!(timeout(QUIET, bus.write.b.recv()).await.is_err());
    // Writes that completed before reset are not rolled back.
    assert_eq!(vec![0x33; 4], ram.memory().read_vec(8, 4));
}

#[tokio::test]
async fn stalled_address_is_dropped_by_reset() {
    let (bus, ram) = new_ram(128);

    // The engine takes 0x00 and waits for data, 0x10 and 0x20 fill the queue, 0x40 stalls.
    for addr in [0x00, 0x10, 0x20] {
        bus.write.aw.send(AxiLiteAw::new(addr, None)).await;
    }
    let stalled = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.write.aw.send(AxiLiteAw::new(0x40, None)).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(bus.write.aw.is_full());
    assert!(!stalled.is_finished());

    ram.assert_reset(true).await;
    assert_eq!(0, bus.write.aw.len());
    timeout(TIMEOUT, stalled).await.unwrap().unwrap();
    assert!(bus.write.aw.is_idle());

    ram.assert_reset(false).await;
    bus.write.w.send(AxiLiteW::new(0xDEAD_BEEF, None)).await;
    assert!(timeout(QUIET, bus.write.b.recv()).await.is_err());
    assert_eq!(vec![0; 4], ram.memory().read_vec(0x40, 4));

    // The data waits for the first address sent after reset.
    bus.write.aw.send(AxiLiteAw::new(0x08, None)).await;
    assert_eq!(
        AxiResp::Okay,
        timeout(TIMEOUT, bus.write.b.recv()).await.unwrap().resp
    );
    assert_eq!(vec![0xEF, 0xBE, 0xAD, 0xDE], ram.memory().read_vec(0x08, 4));
}

#[tokio::test]
async fn reset_is_idempotent() {
    let (bus, ram) = new_ram(64);

    ram.assert_reset(false).await;
    assert!(ram.is_running().await);

    ram.assert_reset(true).await;
    ram.assert_reset(true).await;
    assert!(!ram.write_if().is_running().await);

    ram.assert_reset(false).await;
    ram.assert_reset(false).await;
    assert!(ram.is_running().await);

    assert_eq!(AxiResp::Okay, write(&bus, 0, 0x5A5A_5A5A, None).await);
    assert_eq!(0x5A5A_5A5A, read(&bus, 0).await);
}

#[tokio::test]
async fn external_reset_signal() {
    let bus = AxiLiteBus::new(BusWidths::new(32, 32));
    let (levels, receiver) = mpsc::unbounded();
    let ram = AxiLiteRam::new(
        bus.clone(),
        Some(ResetSignal::active_high(receiver)),
        RamConfig::default(),
    )
    .unwrap();

    levels.unbounded_send(true).unwrap();
    wait_for_reset(&ram, true).await;

    // No handshake completes while in reset.
    ram.memory().write(0, &[0x5A; 4]);
    assert!(bus.read.ar.try_send(AxiLiteAr::new(0, None)).is_err());
    let sender = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.read.ar.send(AxiLiteAr::new(0, None)).await })
    };
    assert!(timeout(QUIET, bus.read.r.recv()).await.is_err());
    assert_eq!(0, bus.read.ar.len());
    assert!(!sender.is_finished());

    // The address is accepted, and answered, once reset is released.
    levels.unbounded_send(false).unwrap();
    wait_for_reset(&ram, false).await;
    timeout(TIMEOUT, sender).await.unwrap().unwrap();
    let r = timeout(TIMEOUT, bus.read.r.recv()).await.unwrap();
    assert_eq!(0x5A5A_5A5A, r.data);
    assert_eq!(AxiResp::Okay, write(&bus, 4, 0xCAFE_F00D, None).await);
    assert_eq!(0xCAFE_F00D, read(&bus, 4).await);
}

#[tokio::test]
async fn local_reset_holds_against_external_release() {
    let bus = AxiLiteBus::new(BusWidths::new(32, 32));
    let (levels, receiver) = mpsc::unbounded();
    let ram = AxiLiteRam::new(
        bus.clone(),
        Some(ResetSignal::active_low(receiver)),
        RamConfig::default(),
    )
    .unwrap();

    levels.unbounded_send(false).unwrap();
    wait_for_reset(&ram, true).await;
    ram.assert_reset(true).await;

    levels.unbounded_send(true).unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(ram.in_reset().await);

    ram.assert_reset(false).await;
    wait_for_reset(&ram, false).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_reads_and_writes() {
    let bus = AxiLiteBus::new(BusWidths::new(32, 32));
    let memory = Memory::new(1024).unwrap();
    memory.write(512, &(0..=255).collect::<Vec<u8>>());
    let _ram = AxiLiteRam::with_memory(bus.clone(), None, memory.clone()).unwrap();

    let writer = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for i in 0..64u32 {
                assert_eq!(AxiResp::Okay, write(&bus, u64::from(i) * 4, !i, None).await);
            }
        })
    };
    let reader = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for i in 0..64u32 {
                let b = (i * 4) as u8;
                let expected = u32::from_le_bytes([b, b + 1, b + 2, b + 3]);
                assert_eq!(expected, read(&bus, 512 + u64::from(i) * 4).await);
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    for i in 0..64u32 {
        assert_eq!((!i).to_le_bytes().to_vec(), memory.read_vec(u64::from(i) * 4, 4));
    }
}
