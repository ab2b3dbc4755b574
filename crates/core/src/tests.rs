#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::peripherals::gpio::{
        ConfigWarning, Edge, OutputType, PinMode, Pull, Speed, Trigger, VirtualGpio,
    };
    use crate::peripherals::nvic::{VirtualNvic, IRQ_LINE_COUNT, MAX_PRIORITY};
    use crate::{Board, SimulationError};

    fn output_pin(gpio: &mut VirtualGpio, port: u8, pin: u8) {
        gpio.enable_clock(port).unwrap();
        gpio.configure_pin(
            port,
            pin,
            PinMode::Output,
            OutputType::PushPull,
            Speed::High,
            Pull::None,
        )
        .unwrap();
    }

    #[test]
    fn test_configure_requires_clock() {
        let mut gpio = VirtualGpio::with_seed(1);
        let err = gpio
            .configure_pin(
                0,
                5,
                PinMode::Output,
                OutputType::PushPull,
                Speed::Low,
                Pull::None,
            )
            .unwrap_err();
        assert_eq!(err, SimulationError::ClockNotEnabled(0));

        gpio.enable_clock(0).unwrap();
        gpio.configure_pin(
            0,
            5,
            PinMode::Output,
            OutputType::PushPull,
            Speed::Low,
            Pull::None,
        )
        .unwrap();
    }

    #[test]
    fn test_range_validation() {
        let mut gpio = VirtualGpio::with_seed(1);
        assert_eq!(
            gpio.enable_clock(9).unwrap_err(),
            SimulationError::InvalidPort(9)
        );
        gpio.enable_clock(0).unwrap();
        assert_eq!(
            gpio.configure_pin(
                0,
                16,
                PinMode::Input,
                OutputType::PushPull,
                Speed::Low,
                Pull::None
            )
            .unwrap_err(),
            SimulationError::InvalidPin(16)
        );
        assert_eq!(
            gpio.write_pin(12, 0, true).unwrap_err(),
            SimulationError::InvalidPort(12)
        );
        assert_eq!(
            gpio.read_pin(0, 20).unwrap_err(),
            SimulationError::InvalidPin(20)
        );
    }

    #[test]
    fn test_interrupt_mode_rejected_by_configure_pin() {
        let mut gpio = VirtualGpio::with_seed(1);
        gpio.enable_clock(0).unwrap();
        let err = gpio
            .configure_pin(
                0,
                1,
                PinMode::InterruptRising,
                OutputType::PushPull,
                Speed::Low,
                Pull::None,
            )
            .unwrap_err();
        assert_eq!(err, SimulationError::ConfigurationError);
    }

    #[test]
    fn test_output_write_read_roundtrip() {
        let mut gpio = VirtualGpio::with_seed(1);
        output_pin(&mut gpio, 0, 5);

        assert_eq!(gpio.write_pin(0, 5, true).unwrap(), None);
        assert!(gpio.read_pin(0, 5).unwrap());

        assert_eq!(gpio.toggle_pin(0, 5).unwrap(), false);
        assert!(!gpio.read_pin(0, 5).unwrap());
    }

    #[test]
    fn test_toggle_is_self_inverse() {
        let mut gpio = VirtualGpio::with_seed(1);
        output_pin(&mut gpio, 3, 7);
        gpio.write_pin(3, 7, true).unwrap();

        gpio.toggle_pin(3, 7).unwrap();
        gpio.toggle_pin(3, 7).unwrap();
        assert!(gpio.read_pin(3, 7).unwrap());
    }

    #[test]
    fn test_write_to_non_output_pin_warns_but_lands() {
        let mut gpio = VirtualGpio::with_seed(1);
        gpio.enable_clock(1).unwrap();
        gpio.configure_pin(
            1,
            3,
            PinMode::Analog,
            OutputType::PushPull,
            Speed::Low,
            Pull::None,
        )
        .unwrap();

        let warning = gpio.write_pin(1, 3, true).unwrap();
        assert_eq!(warning, Some(ConfigWarning::NotOutputMode));
        // Non-input modes read back the driven value.
        assert!(gpio.read_pin(1, 3).unwrap());
    }

    #[test]
    fn test_input_read_resolves_pull() {
        let mut gpio = VirtualGpio::with_seed(1);
        gpio.enable_clock(1).unwrap();

        gpio.configure_pin(
            1,
            3,
            PinMode::Input,
            OutputType::PushPull,
            Speed::Low,
            Pull::Up,
        )
        .unwrap();
        assert!(gpio.read_pin(1, 3).unwrap());

        gpio.configure_pin(
            1,
            3,
            PinMode::Input,
            OutputType::PushPull,
            Speed::Low,
            Pull::Down,
        )
        .unwrap();
        assert!(!gpio.read_pin(1, 3).unwrap());
    }

    #[test]
    fn test_floating_input_is_seed_deterministic() {
        let mut a = VirtualGpio::with_seed(99);
        let mut b = VirtualGpio::with_seed(99);
        for gpio in [&mut a, &mut b] {
            gpio.enable_clock(2).unwrap();
            gpio.configure_pin(
                2,
                0,
                PinMode::Input,
                OutputType::PushPull,
                Speed::Low,
                Pull::None,
            )
            .unwrap();
        }

        let reads_a: Vec<bool> = (0..8).map(|_| a.read_pin(2, 0).unwrap()).collect();
        let reads_b: Vec<bool> = (0..8).map(|_| b.read_pin(2, 0).unwrap()).collect();
        assert_eq!(reads_a, reads_b);
    }

    #[test]
    fn test_alternate_function() {
        let mut gpio = VirtualGpio::with_seed(1);
        gpio.enable_clock(0).unwrap();
        gpio.configure_pin(
            0,
            9,
            PinMode::Alternate,
            OutputType::PushPull,
            Speed::Fast,
            Pull::None,
        )
        .unwrap();

        assert_eq!(gpio.set_alternate_function(0, 9, 7).unwrap(), None);
        assert_eq!(gpio.ports[0].pins[9].alternate_function, 7);
    }

    #[test]
    fn test_alternate_function_on_wrong_mode_warns_but_applies() {
        let mut gpio = VirtualGpio::with_seed(1);
        gpio.enable_clock(0).unwrap();

        let warning = gpio.set_alternate_function(0, 2, 5).unwrap();
        assert_eq!(warning, Some(ConfigWarning::NotAlternateMode));
        assert_eq!(gpio.ports[0].pins[2].alternate_function, 5);
    }

    #[test]
    fn test_alternate_function_range() {
        let mut gpio = VirtualGpio::with_seed(1);
        assert_eq!(
            gpio.set_alternate_function(0, 0, 16).unwrap_err(),
            SimulationError::PinMuxError
        );
        assert_eq!(
            gpio.set_alternate_function(9, 0, 1).unwrap_err(),
            SimulationError::PinMuxError
        );
    }

    #[test]
    fn test_edge_trigger_matching() {
        let mut gpio = VirtualGpio::with_seed(1);
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        gpio.configure_interrupt(
            2,
            13,
            Trigger::Falling,
            Some(Box::new(move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        gpio.simulate_interrupt(2, 13, Edge::Rising);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        gpio.simulate_interrupt(2, 13, Edge::Falling);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_both_trigger_fires_on_either_edge() {
        let mut gpio = VirtualGpio::with_seed(1);
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        gpio.configure_interrupt(
            4,
            0,
            Trigger::Both,
            Some(Box::new(move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        gpio.simulate_interrupt(4, 0, Edge::Rising);
        gpio.simulate_interrupt(4, 0, Edge::Falling);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_simulate_on_unarmed_pin_is_noop() {
        let mut gpio = VirtualGpio::with_seed(1);
        // Plain input pin, no trigger, no handler; also out of range.
        gpio.simulate_interrupt(0, 0, Edge::Rising);
        gpio.simulate_interrupt(9, 0, Edge::Rising);
        // Armed but handler-less pin must not panic either.
        gpio.configure_interrupt(1, 1, Trigger::Rising, None).unwrap();
        gpio.simulate_interrupt(1, 1, Edge::Rising);
    }

    #[test]
    fn test_handler_receives_port_and_pin() {
        let mut gpio = VirtualGpio::with_seed(1);
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        gpio.configure_interrupt(
            3,
            11,
            Trigger::Rising,
            Some(Box::new(move |port, pin| {
                *slot.lock().unwrap() = Some((port, pin));
            })),
        )
        .unwrap();

        gpio.simulate_interrupt(3, 11, Edge::Rising);
        assert_eq!(*seen.lock().unwrap(), Some((3, 11)));
    }

    #[test]
    fn test_injected_fault_leaves_pin_untouched() {
        let mut gpio = VirtualGpio::with_seed(1);
        output_pin(&mut gpio, 0, 5);
        gpio.write_pin(0, 5, true).unwrap();

        gpio.faults_mut().set_enabled(true);
        gpio.faults_mut().set_probability(1.0);
        assert_eq!(
            gpio.write_pin(0, 5, false).unwrap_err(),
            SimulationError::InjectedFault
        );
        assert_eq!(
            gpio.toggle_pin(0, 5).unwrap_err(),
            SimulationError::InjectedFault
        );

        gpio.faults_mut().set_enabled(false);
        assert!(gpio.read_pin(0, 5).unwrap());
    }

    #[test]
    fn test_injected_fault_leaves_clock_untouched() {
        let mut gpio = VirtualGpio::with_seed(1);
        gpio.faults_mut().set_enabled(true);
        gpio.faults_mut().set_probability(1.0);

        assert_eq!(
            gpio.enable_clock(4).unwrap_err(),
            SimulationError::InjectedFault
        );
        assert!(!gpio.port(4).unwrap().clock_enabled());
    }

    #[test]
    fn test_irq_range_validation() {
        let mut nvic = VirtualNvic::with_seed(1);
        assert_eq!(
            nvic.enable_irq(IRQ_LINE_COUNT).unwrap_err(),
            SimulationError::InvalidIrq(IRQ_LINE_COUNT)
        );
        assert_eq!(
            nvic.set_priority(300, 0).unwrap_err(),
            SimulationError::InvalidIrq(300)
        );
        assert!(!nvic.is_pending(900));
        assert_eq!(nvic.priority(900), MAX_PRIORITY);
    }

    #[test]
    fn test_priority_range_validation() {
        let mut nvic = VirtualNvic::with_seed(1);
        assert_eq!(
            nvic.set_priority(6, 16).unwrap_err(),
            SimulationError::InvalidPriority(16)
        );
        assert_eq!(nvic.priority(6), MAX_PRIORITY);
    }

    #[test]
    fn test_dispatch_order_follows_priority() {
        let mut nvic = VirtualNvic::with_seed(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for (id, priority) in [(6u16, 2u8), (23, 1), (37, 3)] {
            let log = order.clone();
            nvic.enable_irq(id).unwrap();
            nvic.set_priority(id, priority).unwrap();
            nvic.set_handler(
                id,
                Box::new(move |_| log.lock().unwrap().push(id)),
                None,
            )
            .unwrap();
            nvic.set_pending(id).unwrap();
        }

        assert_eq!(nvic.process_one(), Some(23));
        assert_eq!(nvic.process_all(), 2);
        assert_eq!(*order.lock().unwrap(), vec![23, 6, 37]);
    }

    #[test]
    fn test_equal_priority_ties_resolve_to_lowest_id() {
        let mut nvic = VirtualNvic::with_seed(1);
        for id in [10u16, 5] {
            nvic.enable_irq(id).unwrap();
            nvic.set_priority(id, 4).unwrap();
            nvic.set_pending(id).unwrap();
        }

        assert_eq!(nvic.process_one(), Some(5));
        assert_eq!(nvic.process_one(), Some(10));
        assert_eq!(nvic.process_one(), None);
    }

    #[test]
    fn test_dispatch_without_handler_consumes_pending() {
        let mut nvic = VirtualNvic::with_seed(1);
        nvic.enable_irq(8).unwrap();
        nvic.set_pending(8).unwrap();

        assert_eq!(nvic.process_one(), Some(8));
        assert!(!nvic.is_pending(8));
    }

    #[test]
    fn test_disabled_line_is_not_dispatched() {
        let mut nvic = VirtualNvic::with_seed(1);
        nvic.enable_irq(12).unwrap();
        nvic.set_priority(12, 3).unwrap();
        nvic.set_pending(12).unwrap();
        nvic.disable_irq(12).unwrap();

        assert_eq!(nvic.process_one(), None);
        // Disable removes eligibility only; pending and priority stay.
        assert!(nvic.is_pending(12));
        assert_eq!(nvic.priority(12), 3);

        nvic.enable_irq(12).unwrap();
        assert_eq!(nvic.process_one(), Some(12));
    }

    #[test]
    fn test_global_gate_blocks_and_drains() {
        let mut nvic = VirtualNvic::with_seed(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for (id, priority) in [(3u16, 9u8), (40, 1)] {
            let log = order.clone();
            nvic.enable_irq(id).unwrap();
            nvic.set_priority(id, priority).unwrap();
            nvic.set_handler(
                id,
                Box::new(move |_| log.lock().unwrap().push(id)),
                None,
            )
            .unwrap();
            nvic.set_pending(id).unwrap();
        }

        nvic.disable_global();
        assert_eq!(nvic.process_one(), None);
        assert_eq!(nvic.process_all(), 0);
        assert!(order.lock().unwrap().is_empty());
        assert!(nvic.is_pending(3) && nvic.is_pending(40));

        nvic.enable_global();
        assert_eq!(nvic.process_all(), 2);
        assert_eq!(*order.lock().unwrap(), vec![40, 3]);
    }

    #[test]
    fn test_self_pending_handler_hits_safety_cap() {
        let mut nvic = VirtualNvic::with_seed(1);
        nvic.enable_irq(7).unwrap();
        nvic.set_handler(
            7,
            Box::new(|nvic: &mut VirtualNvic| nvic.set_pending(7).unwrap()),
            Some("Storm"),
        )
        .unwrap();
        nvic.set_pending(7).unwrap();

        assert_eq!(nvic.process_all(), 100);
        assert!(nvic.is_pending(7));
    }

    #[test]
    fn test_line_is_active_exactly_while_handler_runs() {
        let mut nvic = VirtualNvic::with_seed(1);
        let was_active = Arc::new(AtomicUsize::new(0));
        let flag = was_active.clone();
        nvic.enable_irq(15).unwrap();
        nvic.set_handler(
            15,
            Box::new(move |nvic: &mut VirtualNvic| {
                if nvic.line(15).unwrap().is_active() {
                    flag.fetch_add(1, Ordering::SeqCst);
                }
            }),
            None,
        )
        .unwrap();
        nvic.set_pending(15).unwrap();

        nvic.process_one();
        assert_eq!(was_active.load(Ordering::SeqCst), 1);
        assert!(!nvic.line(15).unwrap().is_active());
    }

    #[test]
    fn test_handlers_do_not_nest() {
        let mut nvic = VirtualNvic::with_seed(1);
        let nested = Arc::new(Mutex::new(None));
        let probe = nested.clone();
        for id in [20u16, 21] {
            nvic.enable_irq(id).unwrap();
        }
        nvic.set_handler(
            20,
            Box::new(move |nvic: &mut VirtualNvic| {
                // 21 is pending, but dispatch from inside a handler is
                // refused.
                *probe.lock().unwrap() = Some(nvic.process_one());
            }),
            None,
        )
        .unwrap();
        nvic.set_priority(20, 0).unwrap();
        nvic.set_pending(20).unwrap();
        nvic.set_pending(21).unwrap();

        assert_eq!(nvic.process_one(), Some(20));
        assert_eq!(*nested.lock().unwrap(), Some(None));
        assert_eq!(nvic.process_one(), Some(21));
    }

    #[test]
    fn test_default_line_names_and_override() {
        let mut nvic = VirtualNvic::with_seed(1);
        assert_eq!(nvic.line(37).unwrap().name(), "IRQ_37");

        nvic.set_handler(37, Box::new(|_| {}), Some("USART1")).unwrap();
        assert_eq!(nvic.line(37).unwrap().name(), "USART1");
    }

    #[test]
    fn test_injected_fault_leaves_irq_untouched() {
        let mut nvic = VirtualNvic::with_seed(1);
        nvic.faults_mut().set_enabled(true);
        nvic.faults_mut().set_probability(1.0);

        assert_eq!(
            nvic.enable_irq(50).unwrap_err(),
            SimulationError::InjectedFault
        );
        assert!(!nvic.line(50).unwrap().is_enabled());

        assert_eq!(
            nvic.set_priority(50, 2).unwrap_err(),
            SimulationError::InjectedFault
        );
        assert_eq!(nvic.priority(50), MAX_PRIORITY);

        assert_eq!(
            nvic.set_pending(50).unwrap_err(),
            SimulationError::InjectedFault
        );
        assert!(!nvic.is_pending(50));
    }

    #[test]
    fn test_adc_reads_stay_in_range() {
        let mut board = Board::with_seed(5);
        for channel in 0..16 {
            let sample = board.adc.read(channel).unwrap();
            assert!(sample < 1024);
            assert_eq!(board.adc.last_value(channel), Some(sample));
        }
        assert_eq!(
            board.adc.read(16).unwrap_err(),
            SimulationError::InvalidAdcChannel(16)
        );
    }

    #[test]
    fn test_adc_is_seed_deterministic() {
        let mut a = Board::with_seed(5);
        let mut b = Board::with_seed(5);
        let reads_a: Vec<u16> = (0..16).map(|ch| a.adc.read(ch).unwrap()).collect();
        let reads_b: Vec<u16> = (0..16).map(|ch| b.adc.read(ch).unwrap()).collect();
        assert_eq!(reads_a, reads_b);
    }

    #[test]
    fn test_boards_are_independent() {
        let mut a = Board::with_seed(1);
        let mut b = Board::with_seed(1);
        a.gpio.enable_clock(0).unwrap();
        assert!(a.gpio.port(0).unwrap().clock_enabled());
        assert!(!b.gpio.port(0).unwrap().clock_enabled());

        b.nvic.enable_irq(3).unwrap();
        assert!(!a.nvic.line(3).unwrap().is_enabled());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut board = Board::with_seed(2);
        board.gpio.enable_clock(0).unwrap();
        board
            .gpio
            .configure_pin(
                0,
                5,
                PinMode::Output,
                OutputType::OpenDrain,
                Speed::Medium,
                Pull::Up,
            )
            .unwrap();
        board.gpio.write_pin(0, 5, true).unwrap();
        board.nvic.enable_irq(6).unwrap();
        board.nvic.set_priority(6, 2).unwrap();
        board.nvic.set_pending(9).unwrap();

        let snap = board.snapshot();
        let pa = &snap.gpio[0];
        assert_eq!(pa.name, 'A');
        assert!(pa.clock_enabled);
        assert_eq!(pa.pins[5].mode, PinMode::Output);
        assert_eq!(pa.pins[5].output_type, OutputType::OpenDrain);
        assert!(pa.pins[5].value);

        // Only touched lines show up in the NVIC section.
        assert_eq!(snap.nvic.lines.len(), 2);
        assert_eq!(snap.nvic.lines[0].id, 6);
        assert_eq!(snap.nvic.lines[0].priority, 2);
        assert_eq!(snap.nvic.lines[1].id, 9);
        assert!(snap.nvic.lines[1].pending);
    }
}
