use super::*;

/// A small but complete 2.4 document: one operator, one service with two
/// journey patterns, four stops, five vehicle journeys. Shared with the
/// converter tests.
pub(crate) const SAMPLE_TXC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TransXChange xmlns="http://www.transxchange.org.uk/" SchemaVersion="2.4">
  <StopPoints>
    <AnnotatedStopPointRef>
      <StopPointRef>0100BRP90310</StopPointRef>
      <CommonName>Temple Meads Station</CommonName>
      <Location><Latitude>51.449200</Latitude><Longitude>-2.583100</Longitude></Location>
    </AnnotatedStopPointRef>
    <AnnotatedStopPointRef>
      <StopPointRef>0100BRP90311</StopPointRef>
      <CommonName>Victoria Street</CommonName>
      <Location><Latitude>51.453100</Latitude><Longitude>-2.589000</Longitude></Location>
    </AnnotatedStopPointRef>
    <AnnotatedStopPointRef>
      <StopPointRef>0100BRP90312</StopPointRef>
      <CommonName>Old Market</CommonName>
      <Location><Latitude>51.457300</Latitude><Longitude>-2.583600</Longitude></Location>
    </AnnotatedStopPointRef>
    <AnnotatedStopPointRef>
      <StopPointRef>0100BRP90313</StopPointRef>
      <CommonName>Cabot Circus</CommonName>
      <Location><Latitude>51.458900</Latitude><Longitude>-2.586300</Longitude></Location>
    </AnnotatedStopPointRef>
  </StopPoints>
  <RouteSections>
    <RouteSection id="RS_1">
      <RouteLink id="RL_1_1">
        <From><StopPointRef>0100BRP90310</StopPointRef></From>
        <To><StopPointRef>0100BRP90311</StopPointRef></To>
        <Track>
          <Mapping>
            <Location><Latitude>51.449200</Latitude><Longitude>-2.583100</Longitude></Location>
            <Location><Latitude>51.453100</Latitude><Longitude>-2.589000</Longitude></Location>
          </Mapping>
        </Track>
      </RouteLink>
      <RouteLink id="RL_1_2">
        <From><StopPointRef>0100BRP90311</StopPointRef></From>
        <To><StopPointRef>0100BRP90312</StopPointRef></To>
        <Track>
          <Mapping>
            <Location><Latitude>51.453100</Latitude><Longitude>-2.589000</Longitude></Location>
            <Location><Latitude>51.457300</Latitude><Longitude>-2.583600</Longitude></Location>
          </Mapping>
        </Track>
      </RouteLink>
      <RouteLink id="RL_1_3">
        <From><StopPointRef>0100BRP90312</StopPointRef></From>
        <To><StopPointRef>0100BRP90313</StopPointRef></To>
      </RouteLink>
    </RouteSection>
  </RouteSections>
  <Routes>
    <Route id="R_1">
      <Description>Temple Meads to Cabot Circus</Description>
      <RouteSectionRef>RS_1</RouteSectionRef>
    </Route>
  </Routes>
  <JourneyPatternSections>
    <JourneyPatternSection id="JPS_1">
      <JourneyPatternTimingLink id="JPTL_1_1">
        <From SequenceNumber="1">
          <StopPointRef>0100BRP90310</StopPointRef>
          <TimingStatus>PTP</TimingStatus>
        </From>
        <To SequenceNumber="2">
          <StopPointRef>0100BRP90311</StopPointRef>
          <WaitTime>PT1M</WaitTime>
        </To>
        <RouteLinkRef>RL_1_1</RouteLinkRef>
        <RunTime>PT4M</RunTime>
      </JourneyPatternTimingLink>
      <JourneyPatternTimingLink id="JPTL_1_2">
        <From SequenceNumber="2"><StopPointRef>0100BRP90311</StopPointRef></From>
        <To SequenceNumber="3"><StopPointRef>0100BRP90312</StopPointRef></To>
        <RouteLinkRef>RL_1_2</RouteLinkRef>
        <RunTime>PT3M</RunTime>
      </JourneyPatternTimingLink>
      <JourneyPatternTimingLink id="JPTL_1_3">
        <From SequenceNumber="3"><StopPointRef>0100BRP90312</StopPointRef></From>
        <To SequenceNumber="4"><StopPointRef>0100BRP90313</StopPointRef></To>
        <RouteLinkRef>RL_1_3</RouteLinkRef>
        <RunTime>PT5M</RunTime>
      </JourneyPatternTimingLink>
    </JourneyPatternSection>
    <JourneyPatternSection id="JPS_2">
      <JourneyPatternTimingLink id="JPTL_2_1">
        <From SequenceNumber="1"><StopPointRef>0100BRP90313</StopPointRef></From>
        <To SequenceNumber="2"><StopPointRef>0100BRP90310</StopPointRef></To>
        <RunTime>PT10M</RunTime>
      </JourneyPatternTimingLink>
    </JourneyPatternSection>
  </JourneyPatternSections>
  <Operators>
    <Operator id="O1">
      <NationalOperatorCode>SAMP</NationalOperatorCode>
      <OperatorCode>SMP</OperatorCode>
      <OperatorShortName>Sample Bus</OperatorShortName>
      <TradingName>Sample Bus Company</TradingName>
      <LicenceNumber>PH0001111</LicenceNumber>
    </Operator>
  </Operators>
  <Services>
    <Service>
      <ServiceCode>SVC001</ServiceCode>
      <Lines>
        <Line id="L1"><LineName>42</LineName></Line>
      </Lines>
      <OperatingPeriod>
        <StartDate>2025-01-06</StartDate>
        <EndDate>2025-03-30</EndDate>
      </OperatingPeriod>
      <OperatingProfile>
        <RegularDayType>
          <DaysOfWeek><MondayToFriday/></DaysOfWeek>
        </RegularDayType>
        <SpecialDaysOperation>
          <DaysOfNonOperation>
            <DateRange>
              <StartDate>2025-02-17</StartDate>
              <EndDate>2025-02-21</EndDate>
            </DateRange>
          </DaysOfNonOperation>
        </SpecialDaysOperation>
        <BankHolidayOperation>
          <DaysOfNonOperation>
            <ChristmasDay/>
            <BoxingDay/>
          </DaysOfNonOperation>
        </BankHolidayOperation>
      </OperatingProfile>
      <RegisteredOperatorRef>O1</RegisteredOperatorRef>
      <Description>Temple Meads - Cabot Circus</Description>
      <StandardService>
        <Origin>Temple Meads</Origin>
        <Destination>Cabot Circus</Destination>
        <JourneyPattern id="JP_1">
          <Direction>outbound</Direction>
          <RouteRef>R_1</RouteRef>
          <JourneyPatternSectionRefs>JPS_1</JourneyPatternSectionRefs>
        </JourneyPattern>
        <JourneyPattern id="JP_2">
          <Direction>inbound</Direction>
          <RouteRef>R_1</RouteRef>
          <JourneyPatternSectionRefs>JPS_2</JourneyPatternSectionRefs>
        </JourneyPattern>
      </StandardService>
    </Service>
  </Services>
  <VehicleJourneys>
    <VehicleJourney>
      <VehicleJourneyCode>VJ_1</VehicleJourneyCode>
      <ServiceRef>SVC001</ServiceRef>
      <LineRef>L1</LineRef>
      <JourneyPatternRef>JP_1</JourneyPatternRef>
      <DepartureTime>07:30:00</DepartureTime>
    </VehicleJourney>
    <VehicleJourney>
      <VehicleJourneyCode>VJ_2</VehicleJourneyCode>
      <ServiceRef>SVC001</ServiceRef>
      <LineRef>L1</LineRef>
      <JourneyPatternRef>JP_1</JourneyPatternRef>
      <DepartureTime>09:00:00</DepartureTime>
    </VehicleJourney>
    <VehicleJourney>
      <VehicleJourneyCode>VJ_3</VehicleJourneyCode>
      <ServiceRef>SVC001</ServiceRef>
      <LineRef>L1</LineRef>
      <JourneyPatternRef>JP_1</JourneyPatternRef>
      <DepartureTime>17:30:00</DepartureTime>
    </VehicleJourney>
    <VehicleJourney>
      <VehicleJourneyCode>VJ_4</VehicleJourneyCode>
      <ServiceRef>SVC001</ServiceRef>
      <LineRef>L1</LineRef>
      <JourneyPatternRef>JP_2</JourneyPatternRef>
      <DepartureTime>08:15:00</DepartureTime>
    </VehicleJourney>
    <VehicleJourney>
      <VehicleJourneyCode>VJ_5</VehicleJourneyCode>
      <ServiceRef>SVC001</ServiceRef>
      <LineRef>L1</LineRef>
      <JourneyPatternRef>JP_2</JourneyPatternRef>
      <DepartureTime>18:00:00</DepartureTime>
      <OperatingProfile>
        <RegularDayType>
          <DaysOfWeek><Saturday/></DaysOfWeek>
        </RegularDayType>
      </OperatingProfile>
    </VehicleJourney>
  </VehicleJourneys>
</TransXChange>
"#;

fn sample() -> TxcDocument {
    TxcDocument::from_str(SAMPLE_TXC)
}

#[test]
fn schema_version_is_read_from_root() {
    assert_eq!(sample().schema_version, "2.4");
}

#[test]
fn counts_match_the_document() {
    let doc = sample();
    assert_eq!(doc.operator_count(), 1);
    assert_eq!(doc.service_count(), 1);
    assert_eq!(doc.stop_point_count(), 4);
    assert_eq!(doc.vehicle_journey_count(), 5);
    assert_eq!(doc.journey_pattern_section_count(), 2);
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn operator_fields_and_names() {
    let doc = sample();
    let operator = &doc.operators[0];
    assert_eq!(operator.id, "O1");
    assert_eq!(operator.code(), "SAMP");
    assert_eq!(operator.display_name(), "Sample Bus Company");
    assert_eq!(operator.license_number.as_deref(), Some("PH0001111"));
    assert!(doc.operator_names()[0].contains("Sample Bus"));
}

#[test]
fn service_and_stop_accessors() {
    let doc = sample();
    assert_eq!(doc.service_codes(), vec!["SVC001"]);
    let codes = doc.stop_codes();
    assert!(codes.contains(&"0100BRP90310"));
    assert!(codes.contains(&"0100BRP90313"));

    let stop = &doc.stop_points[0];
    assert_eq!(stop.common_name, "Temple Meads Station");
    assert_eq!(stop.latitude, Some(51.4492));
}

#[test]
fn journey_patterns_and_sections_resolve() {
    let doc = sample();
    let service = doc.service_by_code("SVC001").unwrap();
    assert_eq!(service.lines[0].name, "42");
    assert_eq!(service.journey_patterns.len(), 2);
    assert_eq!(service.journey_patterns[0].section_refs, vec!["JPS_1"]);

    let section = doc.journey_pattern_section("JPS_1").unwrap();
    assert_eq!(section.timing_links.len(), 3);
    let first = &section.timing_links[0];
    assert_eq!(first.from.stop_ref, "0100BRP90310");
    assert_eq!(first.to.stop_ref, "0100BRP90311");
    assert_eq!(first.run_time_seconds, Some(240));
    assert_eq!(first.to.wait_seconds, Some(60));
    assert_eq!(first.route_link_ref.as_deref(), Some("RL_1_1"));
}

#[test]
fn route_geometry_is_collected() {
    let doc = sample();
    let route = doc.route_by_id("R_1").unwrap();
    assert_eq!(route.section_refs, vec!["RS_1"]);
    let section = doc.route_section("RS_1").unwrap();
    assert_eq!(section.links.len(), 3);
    assert_eq!(section.links[0].locations.len(), 2);
    assert_eq!(section.links[0].from_stop.as_deref(), Some("0100BRP90310"));
    assert!(section.links[2].locations.is_empty());
}

#[test]
fn operating_profiles_are_parsed() {
    let doc = sample();
    let service = &doc.services[0];
    let profile = service.operating_profile.as_ref().unwrap();
    assert_eq!(
        profile.regular_days.weekdays,
        [true, true, true, true, true, false, false]
    );
    assert_eq!(profile.bank_holiday_non_operation, vec!["ChristmasDay", "BoxingDay"]);
    assert_eq!(profile.special_non_operation.len(), 1);
    let range = profile.special_non_operation[0];
    assert_eq!(range.start.to_string(), "2025-02-17");
    assert_eq!(range.end.to_string(), "2025-02-21");

    // Journey-level override on VJ_5 only.
    assert!(doc.vehicle_journeys[..4].iter().all(|vj| vj.operating_profile.is_none()));
    let own = doc.vehicle_journeys[4].operating_profile.as_ref().unwrap();
    assert_eq!(
        own.regular_days.weekdays,
        [false, false, false, false, false, true, false]
    );
}

#[test]
fn departure_times_are_seconds_since_midnight() {
    let doc = sample();
    assert_eq!(doc.vehicle_journeys[0].departure_seconds, Some(7 * 3600 + 30 * 60));
    assert_eq!(doc.vehicle_journeys[4].departure_seconds, Some(18 * 3600));
}

#[test]
fn prefixed_namespaces_match_by_local_name() {
    let prefixed = r#"<?xml version="1.0"?>
<txc:TransXChange xmlns:txc="http://www.transxchange.org.uk/" SchemaVersion="2.5">
  <txc:Operators>
    <txc:Operator id="OP1">
      <txc:OperatorShortName>Prefixed Operator</txc:OperatorShortName>
    </txc:Operator>
  </txc:Operators>
  <txc:VehicleJourneys>
    <txc:VehicleJourney>
      <txc:VehicleJourneyCode>VJ1</txc:VehicleJourneyCode>
      <txc:DepartureTime>10:00:00</txc:DepartureTime>
      <txc:Operational>
        <txc:TicketMachine><txc:JourneyCode>1001</txc:JourneyCode></txc:TicketMachine>
      </txc:Operational>
    </txc:VehicleJourney>
  </txc:VehicleJourneys>
</txc:TransXChange>"#;

    let doc = TxcDocument::from_str(prefixed);
    assert_eq!(doc.schema_version, "2.5");
    assert_eq!(doc.operator_count(), 1);
    assert_eq!(doc.operators[0].short_name.as_deref(), Some("Prefixed Operator"));
    assert_eq!(doc.vehicle_journeys[0].journey_code.as_deref(), Some("1001"));
}

#[test]
fn invalid_xml_returns_empty_document_with_diagnostics() {
    let doc = TxcDocument::from_str("this is not valid xml");
    assert_eq!(doc.operator_count(), 0);
    assert_eq!(doc.service_count(), 0);
    assert_eq!(doc.schema_version, "");
    assert!(!doc.diagnostics.is_empty());
}

#[test]
fn empty_input_returns_empty_document() {
    let doc = TxcDocument::from_str("");
    assert_eq!(doc.operator_count(), 0);
    assert_eq!(doc.service_count(), 0);
    assert!(!doc.diagnostics.is_empty());
}

#[test]
fn unknown_elements_are_skipped() {
    let content = r#"<?xml version="1.0"?>
<TransXChange SchemaVersion="2.4">
  <SomethingNew><Nested><Deep>ignored</Deep></Nested></SomethingNew>
  <Operators>
    <Operator id="OP1"><OperatorShortName>Test Operator</OperatorShortName></Operator>
  </Operators>
</TransXChange>"#;
    let doc = TxcDocument::from_str(content);
    assert_eq!(doc.operator_count(), 1);
    assert!(doc.diagnostics.is_empty());
}

#[test]
fn missing_file_is_an_error() {
    assert!(TxcDocument::from_path("/nonexistent/path.xml").is_err());
}

#[test]
fn minimal_document_from_string() {
    let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<TransXChange xmlns="http://www.transxchange.org.uk/" SchemaVersion="2.4">
  <Operators>
    <Operator id="OP1">
      <OperatorShortName>Test Operator</OperatorShortName>
    </Operator>
  </Operators>
  <Services>
    <Service>
      <ServiceCode>TEST001</ServiceCode>
    </Service>
  </Services>
  <StopPoints></StopPoints>
  <VehicleJourneys></VehicleJourneys>
</TransXChange>"#;

    let doc = TxcDocument::from_str(content);
    assert_eq!(doc.operator_count(), 1);
    assert_eq!(doc.service_count(), 1);
    assert_eq!(doc.stop_point_count(), 0);
}
